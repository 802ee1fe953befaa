use std::collections::HashMap;

/// A nullable list of `text -> text` maps stored as a JSON array of objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullMapList {
    pub valid: bool,
    pub list: Vec<HashMap<String, String>>,
}

null_json_wrapper!(NullMapList, list: Vec<HashMap<String, String>>, "[]");

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

impl Country {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let code = code.into().to_ascii_uppercase();
        let flag = flag_emoji(&code);
        Self { code, name: name.into(), flag }
    }
}

/// Builds the flag emoji from the regional-indicator code points of an ISO-2
/// code. Returns `None` for anything that is not two ASCII letters.
pub fn flag_emoji(code: &str) -> Option<String> {
    if !crate::domain::package::is_iso2(code) {
        return None;
    }

    code.to_ascii_uppercase()
        .chars()
        .map(|ch| char::from_u32(0x1F1E6 + (ch as u32 - 'A' as u32)))
        .collect()
}

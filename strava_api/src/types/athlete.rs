use serde::{Deserialize, Deserializer, Serialize};

use super::Gender;

/// Athlete as embedded in a segment effort. Privacy settings can hide the
/// name and sex, so every field except the id is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteSummary {
    pub id: i64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    /// Absent, null, empty and unrecognized codes all read as `None`.
    #[serde(default, deserialize_with = "lenient_sex")]
    pub sex: Option<Gender>,
}

fn lenient_sex<'de, D>(deserializer: D) -> Result<Option<Gender>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

impl AthleteSummary {
    /// "Firstname Lastname", falling back to a placeholder when both are hidden.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.firstname.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            format!("Athlete {}", self.id)
        } else {
            parts.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_joins_parts() {
        let athlete = AthleteSummary {
            id: 648204,
            firstname: Some("Alex".to_string()),
            lastname: Some("S.".to_string()),
            sex: Some(Gender::Male),
        };
        assert_eq!(athlete.display_name(), "Alex S.");
    }

    #[test]
    fn blank_sex_reads_as_none() {
        let athlete: AthleteSummary =
            serde_json::from_str(r#"{"id": 1, "sex": ""}"#).unwrap();
        assert_eq!(athlete.sex, None);
        let athlete: AthleteSummary = serde_json::from_str(r#"{"id": 1, "sex": "F"}"#).unwrap();
        assert_eq!(athlete.sex, Some(Gender::Female));
    }

    #[test]
    fn display_name_placeholder_when_hidden() {
        let athlete = AthleteSummary {
            id: 7,
            firstname: None,
            lastname: Some("  ".to_string()),
            sex: None,
        };
        assert_eq!(athlete.display_name(), "Athlete 7");
    }
}

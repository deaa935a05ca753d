// Header resolution: map raw column headers to canonical fields by
// sanitized, case-insensitive substring match. Leftmost match wins.

use crate::model::CanonicalField;

/// Trim whitespace and strip one layer of surrounding quotes. Casing is kept.
pub fn sanitize(header: &str) -> String {
    let trimmed = header.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|&q| {
            trimmed
                .strip_prefix(q)
                .and_then(|rest| rest.strip_suffix(q))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

pub fn sanitize_all<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    headers.iter().map(|h| sanitize(h.as_ref())).collect()
}

fn contains_keyword(header: &str, keyword: &str) -> bool {
    sanitize(header).to_lowercase().contains(keyword)
}

/// Index of the first header containing `keyword`, or `None`.
pub fn resolve<S: AsRef<str>>(headers: &[S], keyword: &str) -> Option<usize> {
    let keyword = keyword.to_lowercase();
    headers
        .iter()
        .position(|h| contains_keyword(h.as_ref(), &keyword))
}

/// Every index whose header contains `keyword`, left to right.
pub fn matching_indices<S: AsRef<str>>(headers: &[S], keyword: &str) -> Vec<usize> {
    let keyword = keyword.to_lowercase();
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| contains_keyword(h.as_ref(), &keyword))
        .map(|(i, _)| i)
        .collect()
}

/// Resolved canonical column positions for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: usize,
    pub email: usize,
    pub organization: Option<usize>,
}

impl ColumnMap {
    /// Resolve all canonical fields. Fails with the list of required fields
    /// that could not be found.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self, Vec<CanonicalField>> {
        let name = resolve(headers, CanonicalField::Name.keyword());
        let email = resolve(headers, CanonicalField::Email.keyword());
        let organization = resolve(headers, CanonicalField::Organization.keyword());

        match (name, email) {
            (Some(name), Some(email)) => Ok(Self { name, email, organization }),
            _ => {
                let mut missing = Vec::new();
                if name.is_none() {
                    missing.push(CanonicalField::Name);
                }
                if email.is_none() {
                    missing.push(CanonicalField::Email);
                }
                Err(missing)
            }
        }
    }

    /// Smallest row width that still holds both required columns.
    pub fn required_width(&self) -> usize {
        self.name.max(self.email) + 1
    }
}

/// Warnings for fields whose keyword matches more than one header.
///
/// Each message names the header that was picked and the ones that were ignored.
pub fn ambiguity_warnings<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut warnings = Vec::new();
    for field in CanonicalField::ALL {
        let hits = matching_indices(headers, field.keyword());
        if hits.len() > 1 {
            let ignored: Vec<String> = hits[1..]
                .iter()
                .map(|&i| format!("\"{}\"", sanitize(headers[i].as_ref())))
                .collect();
            warnings.push(format!(
                "{} matched several headers; using \"{}\", ignoring {}",
                field.label(),
                sanitize(headers[hits[0]].as_ref()),
                ignored.join(", ")
            ));
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_and_unquotes_once() {
        assert_eq!(sanitize("  Email  "), "Email");
        assert_eq!(sanitize("\"Full Name\""), "Full Name");
        assert_eq!(sanitize("\" Email \""), "Email");
        assert_eq!(sanitize("'Org'"), "Org");
        assert_eq!(sanitize("\"\"Email\"\""), "\"Email\"");
        assert_eq!(sanitize("\"unbalanced"), "\"unbalanced");
        assert_eq!(sanitize("\""), "\"");
    }

    #[test]
    fn resolve_is_case_insensitive_substring() {
        let headers = ["Email Address", "Full Name"];
        assert_eq!(resolve(&headers, "email"), Some(0));
        assert_eq!(resolve(&headers, "NAME"), Some(1));
        assert_eq!(resolve(&headers, "organization"), None);
    }

    #[test]
    fn resolve_leftmost_wins() {
        let headers = ["Secondary Email", "Email"];
        assert_eq!(resolve(&headers, "email"), Some(0));
        assert_eq!(matching_indices(&headers, "email"), vec![0, 1]);
    }

    #[test]
    fn resolve_sees_through_quotes_and_padding() {
        let headers = ["id", "  \"E-MAIL Email\" "];
        assert_eq!(resolve(&headers, "email"), Some(1));
    }

    #[test]
    fn column_map_reports_every_missing_field() {
        assert_eq!(
            ColumnMap::resolve(&["phone", "city"]).unwrap_err(),
            vec![CanonicalField::Name, CanonicalField::Email]
        );
        assert_eq!(
            ColumnMap::resolve(&["Name", "phone"]).unwrap_err(),
            vec![CanonicalField::Email]
        );
    }

    #[test]
    fn column_map_organization_optional() {
        let map = ColumnMap::resolve(&["email", "name", "org"]).unwrap();
        assert_eq!(map, ColumnMap { name: 1, email: 0, organization: None });
        assert_eq!(map.required_width(), 2);

        let map = ColumnMap::resolve(&["Organization", "Contact Name", "Email"]).unwrap();
        assert_eq!(map.organization, Some(0));
        assert_eq!(map.name, 1);
    }

    #[test]
    fn ambiguity_warning_names_choice() {
        let warnings = ambiguity_warnings(&["Email", "Name", "Secondary Email"]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("using \"Email\""));
        assert!(warnings[0].contains("\"Secondary Email\""));

        assert!(ambiguity_warnings(&["Email", "Name"]).is_empty());
    }
}

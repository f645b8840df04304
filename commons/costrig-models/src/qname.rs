/// Qualified trigger name of the form `/namespace/name`.
///
/// Names without a leading delimiter fall back to the default namespace `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: String,
    pub name: String,
}

const DELIMITER: char = '/';
const DEFAULT_NAMESPACE: &str = "_";

impl QName {
    pub fn parse(qname: &str) -> QName {
        if qname.starts_with(DELIMITER) {
            let parts: Vec<&str> = qname.split(DELIMITER).collect();
            let namespace = parts.get(1).copied().unwrap_or("").to_string();
            let name = if parts.len() > 2 {
                parts[2..].join(&DELIMITER.to_string())
            } else {
                String::new()
            };
            QName { namespace, name }
        } else {
            QName {
                namespace: DEFAULT_NAMESPACE.to_string(),
                name: qname.to_string(),
            }
        }
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.namespace, self.name)
    }
}

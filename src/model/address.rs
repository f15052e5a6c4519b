//! Sender address parsing for forwarded `From:` lines.

/// A parsed sender address.
///
/// # Examples
/// - `"Acme Billing <billing@acme.com>"` → `display_name = "Acme Billing"`, `address = "billing@acme.com"`
/// - `"billing@acme.com"` → `display_name = ""`, `address = "billing@acme.com"`
#[derive(Debug, Clone, PartialEq)]
pub struct SenderAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl SenderAddress {
    /// Parse a single address from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// If parsing fails, the raw string is stored as `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        // "Display Name <address>" or "<address>"
        if let (Some(angle_start), Some(angle_end)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if angle_end > angle_start {
                let addr = trimmed[angle_start + 1..angle_end].trim().to_string();
                let name_part = trimmed[..angle_start].trim();
                return Self {
                    display_name: strip_quotes(name_part),
                    address: addr,
                };
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Organization name guessed from the domain: the label before the first
    /// `.`, title-cased. `billing@acme.co.uk` → `"Acme"`.
    pub fn domain_name(&self) -> Option<String> {
        let (_, domain) = self.address.rsplit_once('@')?;
        let label = domain.split('.').next()?.trim();
        if label.is_empty() {
            return None;
        }
        Some(title_case(label))
    }

    /// Best human-readable sender: display name, else the domain name.
    pub fn sender_name(&self) -> Option<String> {
        if !self.display_name.is_empty() {
            return Some(self.display_name.clone());
        }
        self.domain_name()
    }
}

/// First character upper-case, the rest lower-case.
fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

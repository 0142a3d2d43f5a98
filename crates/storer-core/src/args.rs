use std::{collections::BTreeMap, fmt};

/// Key/value arguments parsed from a caption like `folder=trip, file=beach`.
///
/// Keys are lower-cased and trimmed, values trimmed. The first occurrence of a
/// key wins. Parsing never fails; garbage yields an empty set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Args(BTreeMap<String, String>);

impl Args {
    pub fn parse(caption: Option<&str>) -> Self {
        let mut out = BTreeMap::new();
        let Some(caption) = caption else {
            return Self(out);
        };

        for token in caption.split(',').filter(|s| !s.is_empty()) {
            let parts: Vec<&str> = token.split('=').filter(|s| !s.is_empty()).collect();
            if parts.len() < 2 {
                continue;
            }
            let key = parts[0].trim().to_lowercase();
            let value = parts[1].trim().to_string();
            out.entry(key).or_insert(value);
        }

        Self(out)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Boolean switch such as `title=false`. Unparsable values fall back to `default`.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.to_lowercase()) {
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            },
            None => default,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

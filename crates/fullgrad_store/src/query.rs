//! Regular-expression tensor name queries.

use regex::Regex;

use crate::error::Result;

/// Name of the capture group that identifies a layer inside a tensor name.
const LAYER_GROUP: &str = "layer";

/// A compiled tensor name query.
///
/// Queries select tensors by regex. When the pattern has a named group
/// `layer`, [`TensorQuery::layer_of`] extracts the layer identifier so that
/// tensors of the same layer can be joined by identity.
///
/// # Example
///
/// ```rust
/// use fullgrad_store::TensorQuery;
///
/// let query = TensorQuery::new(r"^(?P<layer>.+)\.running_var$").unwrap();
/// assert_eq!(query.layer_of("layer1.0.bn1.running_var").as_deref(), Some("layer1.0.bn1"));
/// assert!(query.layer_of("layer1.0.bn1.weight").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TensorQuery {
    regex: Regex,
}

impl TensorQuery {
    /// Compile a query from a regular expression.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// The source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Whether `name` matches the query.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Layer identifier of a matching name.
    ///
    /// Uses the `layer` capture group when present, otherwise the whole match.
    #[must_use]
    pub fn layer_of(&self, name: &str) -> Option<String> {
        let captures = self.regex.captures(name)?;
        captures
            .name(LAYER_GROUP)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().to_string())
    }

    /// Filter `names`, keeping matches in their original order.
    pub fn filter<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|name| self.matches(name))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pattern() {
        assert!(TensorQuery::new("gradient/(").is_err());
    }

    #[test]
    fn test_layer_of_without_group_uses_whole_match() {
        let query = TensorQuery::new(r"bn\d").unwrap();
        assert_eq!(query.layer_of("layer1.bn2.weight").as_deref(), Some("bn2"));
    }

    #[test]
    fn test_filter_keeps_order() {
        let names = vec![
            "gradient/bn1_output".to_string(),
            "bn1.weight".to_string(),
            "gradient/layer1.0.bn1_output".to_string(),
        ];
        let query = TensorQuery::new(r"^gradient/(?P<layer>.+)_output$").unwrap();
        assert_eq!(
            query.filter(&names),
            vec!["gradient/bn1_output".to_string(), "gradient/layer1.0.bn1_output".to_string()]
        );
    }
}

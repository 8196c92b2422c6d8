//! Allow-list output shaping.

use doc_store::Document;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Rule {
    Copy { output: String, source: String },
    Object { output: String, source: String, inner: Shaper },
    Each { output: String, source: String, inner: Shaper },
}

/// Builds response documents from composed ones.
///
/// Only listed fields survive. Asset descriptors (`{url, publicId, ...}`)
/// are flattened to their URL so internal host identifiers never reach a
/// response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shaper {
    rules: Vec<Rule>,
}

impl Shaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps a path under the same name.
    pub fn keep(self, path: &str) -> Self {
        self.rename(path, path)
    }

    /// Keeps several top-level fields.
    pub fn keep_all(self, paths: &[&str]) -> Self {
        paths.iter().fold(self, |shaper, path| shaper.keep(path))
    }

    /// Copies `source` to `output`. Missing sources become null.
    pub fn rename(mut self, output: &str, source: &str) -> Self {
        self.rules.push(Rule::Copy {
            output: output.to_string(),
            source: source.to_string(),
        });
        self
    }

    /// Exposes the URL of the asset descriptor stored at `asset`.
    pub fn asset_url(self, output: &str, asset: &str) -> Self {
        self.rename(output, &format!("{asset}.url"))
    }

    /// Shapes the object at `source` with `inner`; null when absent.
    pub fn object(mut self, output: &str, source: &str, inner: Shaper) -> Self {
        self.rules.push(Rule::Object {
            output: output.to_string(),
            source: source.to_string(),
            inner,
        });
        self
    }

    /// Shapes every object of the array at `source` with `inner`.
    pub fn each(mut self, output: &str, source: &str, inner: Shaper) -> Self {
        self.rules.push(Rule::Each {
            output: output.to_string(),
            source: source.to_string(),
            inner,
        });
        self
    }

    pub fn apply(&self, doc: &Document) -> Document {
        let mut shaped = Document::new();
        for rule in &self.rules {
            match rule {
                Rule::Copy { output, source } => {
                    let value = doc.get_path(source).cloned().unwrap_or(Value::Null);
                    shaped.set_path(output, value);
                }
                Rule::Object {
                    output,
                    source,
                    inner,
                } => {
                    let value = match doc.get_path(source) {
                        Some(Value::Object(map)) => {
                            inner.apply(&Document::from(map.clone())).into_value()
                        }
                        _ => Value::Null,
                    };
                    shaped.set_path(output, value);
                }
                Rule::Each {
                    output,
                    source,
                    inner,
                } => {
                    let items = doc
                        .get_path(source)
                        .and_then(Value::as_array)
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(Value::as_object)
                                .map(|map| inner.apply(&Document::from(map.clone())).into_value())
                                .collect()
                        })
                        .unwrap_or_default();
                    shaped.set_path(output, Value::Array(items));
                }
            }
        }
        shaped
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn drops_unlisted_fields_and_flattens_assets() {
        let shaper = Shaper::new()
            .keep("_id")
            .asset_url("avatarUrl", "avatar")
            .keep("missing");
        let out = shaper.apply(&doc(json!({
            "_id": "a",
            "password": "hash",
            "avatar": {"url": "http://h/a.png", "publicId": "a"}
        })));

        assert_eq!(
            out.into_value(),
            json!({"_id": "a", "avatarUrl": "http://h/a.png", "missing": null})
        );
    }

    #[test]
    fn nested_objects_are_null_when_absent() {
        let shaper = Shaper::new().object("latest", "latest", Shaper::new().keep("title"));

        let present = shaper.apply(&doc(json!({"latest": {"title": "t", "views": 3}})));
        assert_eq!(present.get("latest"), Some(&json!({"title": "t"})));

        let absent = shaper.apply(&doc(json!({"latest": null})));
        assert_eq!(absent.get("latest"), Some(&Value::Null));
    }

    #[test]
    fn each_shapes_array_elements_in_order() {
        let shaper = Shaper::new().each(
            "videos",
            "videos",
            Shaper::new().keep("_id").asset_url("thumbnailUrl", "thumbnail"),
        );
        let out = shaper.apply(&doc(json!({
            "videos": [
                {"_id": "v2", "thumbnail": {"url": "u2"}},
                {"_id": "v1", "thumbnail": {"url": "u1"}}
            ]
        })));

        assert_eq!(
            out.get("videos"),
            Some(&json!([
                {"_id": "v2", "thumbnailUrl": "u2"},
                {"_id": "v1", "thumbnailUrl": "u1"}
            ]))
        );
    }

    #[test]
    fn dotted_outputs_build_nested_objects() {
        let shaper = Shaper::new()
            .rename("ownerDetails.username", "owner.username")
            .asset_url("ownerDetails.avatarUrl", "owner.avatar");
        let out = shaper.apply(&doc(json!({
            "owner": {"username": "alice", "avatar": {"url": "u"}}
        })));
        assert_eq!(
            out.into_value(),
            json!({"ownerDetails": {"username": "alice", "avatarUrl": "u"}})
        );
    }
}

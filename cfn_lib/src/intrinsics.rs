use serde_json::{Map, Value};

/// cloudformation pseudo parameters. These can be referenced
/// from any template without being declared.
pub mod pseudo {
    pub const ACCOUNT_ID: &str = "AWS::AccountId";
    pub const PARTITION: &str = "AWS::Partition";
}

pub fn is_pseudo_parameter(name: &str) -> bool {
    name.starts_with("AWS::")
}

fn single_key(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// `{ "Ref": logical_id }`
pub fn get_ref(logical_id: &str) -> Value {
    single_key("Ref", Value::String(logical_id.to_string()))
}

/// `{ "Fn::GetAtt": [logical_id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    single_key(
        "Fn::GetAtt",
        Value::Array(vec![
            Value::String(logical_id.to_string()),
            Value::String(attribute.to_string()),
        ]),
    )
}

/// `{ "Fn::Sub": s }`. Use `${LogicalId}` or `${LogicalId.Attr}` inside of `s`
/// to reference other resources.
pub fn sub(s: &str) -> Value {
    single_key("Fn::Sub", Value::String(s.to_string()))
}

/// `{ "Fn::Join": [delimiter, parts] }`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    single_key(
        "Fn::Join",
        Value::Array(vec![Value::String(delimiter.to_string()), Value::Array(parts)]),
    )
}

/// returns the logical ids that a `Fn::Sub` string refers to.
/// `${!Literal}` escapes are skipped, and `${Name.Attr}` yields `Name`.
pub fn sub_references(s: &str) -> Vec<String> {
    let mut out = vec![];
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = match after.find('}') {
            Some(e) => e,
            None => break,
        };
        let inner = &after[..end];
        if !inner.starts_with('!') && !inner.is_empty() {
            let name = inner.split('.').next().unwrap_or(inner);
            out.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
    out
}

/// walks a json value and collects every logical id referenced through
/// `Ref`, `Fn::GetAtt` or `Fn::Sub`.
pub fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    out.push(target.clone());
                    return;
                }
                if let Some(att) = map.get("Fn::GetAtt") {
                    match att {
                        Value::Array(parts) => {
                            if let Some(Value::String(target)) = parts.first() {
                                out.push(target.clone());
                            }
                        }
                        Value::String(dotted) => {
                            if let Some(target) = dotted.split('.').next() {
                                out.push(target.to_string());
                            }
                        }
                        _ => {}
                    }
                    return;
                }
                if let Some(sub_val) = map.get("Fn::Sub") {
                    match sub_val {
                        Value::String(s) => out.extend(sub_references(s)),
                        Value::Array(parts) => {
                            // [template, { local variables }]
                            let locals = parts.get(1).and_then(|v| v.as_object());
                            if let Some(Value::String(s)) = parts.first() {
                                for name in sub_references(s) {
                                    let is_local = locals.map(|l| l.contains_key(&name)).unwrap_or(false);
                                    if !is_local {
                                        out.push(name);
                                    }
                                }
                            }
                            if let Some(locals) = locals {
                                for v in locals.values() {
                                    collect_references(v, out);
                                }
                            }
                        }
                        _ => {}
                    }
                    return;
                }
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn intrinsics_have_cfn_shape() {
        assert_eq!(get_ref("MyBucket"), json!({"Ref": "MyBucket"}));
        assert_eq!(get_att("MyBucket", "Arn"), json!({"Fn::GetAtt": ["MyBucket", "Arn"]}));
        assert_eq!(
            join("", vec![get_att("B", "Arn"), json!("/*")]),
            json!({"Fn::Join": ["", [{"Fn::GetAtt": ["B", "Arn"]}, "/*"]]})
        );
    }

    #[test]
    fn sub_references_skips_escapes_and_attributes() {
        let refs = sub_references("arn:${AWS::Partition}:x::${!Literal}:${Dist}/${Bucket.Arn}");
        assert_eq!(refs, vec!["AWS::Partition", "Dist", "Bucket"]);
    }

    #[test]
    fn collects_nested_references() {
        let v = json!({
            "A": {"Ref": "One"},
            "B": [{"Fn::GetAtt": ["Two", "Arn"]}, {"Fn::GetAtt": "Three.Id"}],
            "C": {"Fn::Sub": ["${Four}-${local}", {"local": {"Ref": "Five"}}]},
        });
        let mut out = vec![];
        collect_references(&v, &mut out);
        out.sort();
        assert_eq!(out, vec!["Five", "Four", "One", "Three", "Two"]);
    }
}

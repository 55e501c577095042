use serde_json::{Map, Value};

/// Recursively merges `src` into `dest` and returns the result.
///
/// - If `dest` is not an object, it is replaced by an empty object.
/// - If `src` is not an object, `dest` is returned as is.
/// - Objects in `src` are merged into the corresponding object of `dest`, or into a new
///   object if `dest` does not have one at that key.
/// - All other values, including arrays and `null`, replace the value in `dest`.
pub fn merge_deep(dest: Value, src: &Value) -> Value {
    let mut dest = match dest {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Value::Object(src) = src {
        merge_into(&mut dest, src);
    }

    Value::Object(dest)
}

fn merge_into(dest: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, value) in src {
        if value.is_object() {
            let slot = dest.remove(key).unwrap_or(Value::Null);
            dest.insert(key.clone(), merge_deep(slot, value));
        } else {
            dest.insert(key.clone(), value.clone());
        }
    }
}

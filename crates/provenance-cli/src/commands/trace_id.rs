//! Trace-id command implementation.

use provenance_canonical::{identity, is_sha256_hex, InputDescriptor};
use serde_json::json;
use std::collections::BTreeMap;

pub fn run(
    policy_hash: String,
    pipeline_version: String,
    inputs: Vec<String>,
    params: Vec<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = inputs
        .iter()
        .map(|spec| parse_input(spec))
        .collect::<Result<Vec<_>, _>>()?;
    let params = params
        .iter()
        .map(|spec| parse_param(spec))
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let trace_id = identity::trace_id(&policy_hash, &pipeline_version, &inputs, &params)?;
    let scene_id = identity::scene_id(&inputs)?;

    if json {
        let out = json!({ "traceId": trace_id, "sceneId": scene_id });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("traceId: {}", trace_id);
        println!("sceneId: {}", scene_id);
    }
    Ok(())
}

/// `PATH[:HASH[:SIZE]]`. A size is only recognized after a hash, so paths may contain `:`.
fn parse_input(spec: &str) -> Result<InputDescriptor, String> {
    if let Some((rest, last)) = spec.rsplit_once(':') {
        if is_sha256_hex(last) {
            return Ok(InputDescriptor::new(rest).with_hash(last));
        }
        if let Some((path, hash)) = rest.rsplit_once(':') {
            if is_sha256_hex(hash) {
                let size = last
                    .parse::<i64>()
                    .map_err(|e| format!("Invalid size in input {}: {}", spec, e))?;
                return Ok(InputDescriptor::new(path).with_hash(hash).with_size(size));
            }
        }
    }
    Ok(InputDescriptor::new(spec))
}

fn parse_param(spec: &str) -> Result<(String, String), String> {
    spec.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("Invalid param {} (expected KEY=VALUE)", spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_forms() {
        let hash = "c".repeat(64);
        assert_eq!(parse_input("a.png").unwrap(), InputDescriptor::new("a.png"));
        assert_eq!(
            parse_input(&format!("b.png:{hash}")).unwrap(),
            InputDescriptor::new("b.png").with_hash(hash.clone())
        );
        assert_eq!(
            parse_input(&format!("C:/x.png:{hash}:10")).unwrap(),
            InputDescriptor::new("C:/x.png").with_hash(hash.clone()).with_size(10)
        );
        assert!(parse_input(&format!("b.png:{hash}:ten")).is_err());
        assert_eq!(parse_input("s3:bucket").unwrap(), InputDescriptor::new("s3:bucket"));
    }

    #[test]
    fn params_need_equals() {
        assert_eq!(
            parse_param("k=v=w").unwrap(),
            ("k".to_string(), "v=w".to_string())
        );
        assert!(parse_param("novalue").is_err());
    }
}

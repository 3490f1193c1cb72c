use std::collections::BTreeMap;

use provenance_canonical::{
    canonical_digest, event_id, scene_id, sha256_hex, trace_id, Canonicalizer, InputDescriptor,
};
use serde::Serialize;

#[derive(Serialize)]
struct Zam {
    z: u32,
    a: u32,
    m: u32,
}

#[derive(Serialize)]
struct Amz {
    a: u32,
    m: u32,
    z: u32,
}

#[test]
fn field_order_does_not_change_bytes() {
    let canonicalizer = Canonicalizer::new();
    let first = canonicalizer.canonicalize(&Zam { z: 3, a: 1, m: 2 }).unwrap();
    let second = canonicalizer.canonicalize(&Amz { a: 1, m: 2, z: 3 }).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, br#"{"a":1,"m":2,"z":3}"#.to_vec());
}

#[test]
fn struct_with_float_field_is_rejected() {
    #[derive(Serialize)]
    struct Scored {
        name: String,
        score: f64,
    }

    let err = Canonicalizer::new()
        .canonicalize(&Scored {
            name: "x".into(),
            score: 0.5,
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "floating-point value forbidden at score");
}

#[test]
fn trace_id_golden_for_empty_trace() {
    let id = trace_id(&"a".repeat(64), "v1", &[], &BTreeMap::new()).unwrap();
    assert_eq!(
        id,
        "89ae030a70c92c7aa34b3f46904a6eb00fc44a6dc86761a3a5c8809beca34717"
    );
}

#[test]
fn trace_id_golden_with_inputs_and_params() {
    let inputs = vec![
        InputDescriptor::new("b.png")
            .with_hash("c".repeat(64))
            .with_size(10),
        InputDescriptor::new("a.png"),
    ];
    let mut params = BTreeMap::new();
    params.insert("z".to_string(), "1".to_string());
    params.insert("a".to_string(), "x".to_string());

    let id = trace_id(&"a".repeat(64), "v1", &inputs, &params).unwrap();
    assert_eq!(
        id,
        "2f2e855a12da2cbca9af129ee14b0db0a9639d98e82d5559e9893222f21fb40b"
    );

    // Caller ordering is irrelevant.
    let reversed: Vec<InputDescriptor> = inputs.iter().rev().cloned().collect();
    assert_eq!(trace_id(&"a".repeat(64), "v1", &reversed, &params).unwrap(), id);
}

#[test]
fn scene_id_golden() {
    assert_eq!(
        scene_id(&[]).unwrap(),
        "3511fc0647bf743e70b2cd6a6760dba056c98f6695d543f0dceb28c1fc8b0d8d"
    );
    let inputs = vec![InputDescriptor::new("b.png"), InputDescriptor::new("a.png")];
    assert_eq!(
        scene_id(&inputs).unwrap(),
        "0ffe63ccc72d0abe6ac6b90768b74558f3741fdc2fea3630e02651af94b82665"
    );
}

#[test]
fn scene_id_ignores_hashes_and_sizes() {
    let bare = vec![InputDescriptor::new("scene/frame.exr")];
    let rich = vec![InputDescriptor::new("scene/frame.exr")
        .with_hash("d".repeat(64))
        .with_size(4096)];
    assert_eq!(scene_id(&bare).unwrap(), scene_id(&rich).unwrap());
}

#[test]
fn event_id_embeds_trace_id() {
    let trace = trace_id(&"a".repeat(64), "v1", &[], &BTreeMap::new()).unwrap();
    assert_eq!(event_id(&trace, 3).unwrap(), format!("{}:3", trace));
}

#[test]
fn canonical_digest_matches_manual_hash() {
    let mut policy = BTreeMap::new();
    policy.insert("max_inputs".to_string(), 8u32);
    policy.insert("budget".to_string(), 100u32);
    let digest = canonical_digest(&policy, &Canonicalizer::new()).unwrap();
    assert_eq!(digest, sha256_hex(br#"{"budget":100,"max_inputs":8}"#));
}

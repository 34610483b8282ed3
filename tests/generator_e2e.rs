//! End-to-end tests driving full build-then-generate rounds.

use datagen::{Datum, Error, GeneratorBuilder};

#[test]
fn test_long_range_stream_stays_in_bounds() {
    let generator = GeneratorBuilder::new()
        .define("a", "random(1..4)")
        .with_seed(0)
        .build()
        .unwrap();

    for _ in 0..10 {
        let value = generator.next("a").unwrap().as_long().unwrap();
        assert!((1..4).contains(&value), "value {value} escaped [1, 4)");
    }
}

#[test]
fn test_circular_stream_cycles_in_order() {
    let generator = GeneratorBuilder::new()
        .define("x", "circular([1, 2, 3])")
        .build()
        .unwrap();

    let outputs: Vec<i64> = (0..7)
        .map(|_| generator.next("x").unwrap().as_long().unwrap())
        .collect();
    assert_eq!(outputs, vec![1, 2, 3, 1, 2, 3, 1]);
}

#[test]
fn test_string_transformer_formats_discrete_reference() {
    let generator = GeneratorBuilder::new()
        .define("a", "random([1, 2, 3])")
        .define("s", "string('v={}', $a)")
        .with_seed(9)
        .build()
        .unwrap();

    for _ in 0..10 {
        let out = generator.next("s").unwrap();
        let text = out.as_text().unwrap();
        let n: i64 = text.strip_prefix("v=").unwrap().parse().unwrap();
        assert!([1, 2, 3].contains(&n), "unexpected record {text:?}");
    }
}

#[test]
fn test_scoped_reference_resolves_to_sibling() {
    let generator = GeneratorBuilder::new()
        .define("user.first", "'Ada'")
        .define("user.full", "string('{} Lovelace', $first)")
        .build()
        .unwrap();

    for _ in 0..5 {
        assert_eq!(
            generator.next("user.full").unwrap(),
            Datum::Text("Ada Lovelace".to_string())
        );
    }
}

#[test]
fn test_zero_weight_child_is_never_emitted() {
    let generator = GeneratorBuilder::new()
        .define("p", "weighted([(1, 0.0), (2, 1.0)])")
        .with_seed(3)
        .build()
        .unwrap();

    for _ in 0..200 {
        assert_eq!(generator.next("p").unwrap(), Datum::Long(2));
    }
}

#[test]
fn test_exact_weighted_cycle_counts() {
    let generator = GeneratorBuilder::new()
        .define("e", "exactly([(1, 2), (2, 3)])")
        .with_seed(11)
        .build()
        .unwrap();

    for _ in 0..6 {
        let cycle: Vec<i64> = (0..5)
            .map(|_| generator.next("e").unwrap().as_long().unwrap())
            .collect();
        assert_eq!(cycle.iter().filter(|&&v| v == 1).count(), 2, "cycle {cycle:?}");
        assert_eq!(cycle.iter().filter(|&&v| v == 2).count(), 3, "cycle {cycle:?}");
    }
}

#[test]
fn test_multi_reference_is_consistent_within_one_record() {
    let generator = GeneratorBuilder::new()
        .define("a", "random(0..1000000)")
        .define("pair", "string('{} is {}', $a, $a)")
        .with_seed(5)
        .build()
        .unwrap();

    for _ in 0..10 {
        let out = generator.next("pair").unwrap();
        let text = out.as_text().unwrap();
        let (left, right) = text.split_once(" is ").unwrap();
        assert_eq!(left, right, "inconsistent record {text:?}");
    }
}

#[test]
fn test_edge_cases_lead_the_stream_regardless_of_distribution() {
    let generator = GeneratorBuilder::new()
        .define("u", "random(10..20, true)")
        .define("n", "random(10..20, true, normal())")
        .with_seed(21)
        .build()
        .unwrap();

    for name in ["u", "n"] {
        assert_eq!(generator.next(name).unwrap(), Datum::Long(10));
        assert_eq!(generator.next(name).unwrap(), Datum::Long(19));
    }
}

#[test]
fn test_json_round_trips_primitive_definition() {
    let generator = GeneratorBuilder::new()
        .define("n", "42")
        .define("j", "json($n)")
        .build()
        .unwrap();

    let out = generator.next("j").unwrap();
    let decoded: serde_json::Value = serde_json::from_str(out.as_text().unwrap()).unwrap();
    assert_eq!(decoded, serde_json::json!(42));
}

#[test]
fn test_json_document_from_implicit_parent() {
    let generator = GeneratorBuilder::new()
        .define("user.name", "'Grace'")
        .define("user.age", "random(30..31)")
        .define("doc", "json($user)")
        .with_seed(2)
        .build()
        .unwrap();

    let out = generator.next("doc").unwrap();
    let decoded: serde_json::Value = serde_json::from_str(out.as_text().unwrap()).unwrap();
    assert_eq!(decoded, serde_json::json!({"name": "Grace", "age": 30}));
}

#[test]
fn test_whole_generator_reset_replays_streams() {
    let generator = GeneratorBuilder::new()
        .define("id", "uuid()")
        .define("score", "random(0.0..1.0)")
        .with_seed(13)
        .build()
        .unwrap();

    let ids: Vec<Datum> = (0..5).map(|_| generator.next("id").unwrap()).collect();
    let scores: Vec<Datum> = (0..5).map(|_| generator.next("score").unwrap()).collect();

    generator.reset_all();

    let ids_again: Vec<Datum> = (0..5).map(|_| generator.next("id").unwrap()).collect();
    let scores_again: Vec<Datum> = (0..5).map(|_| generator.next("score").unwrap()).collect();

    assert_eq!(ids, ids_again);
    assert_eq!(scores, scores_again);
}

#[test]
fn test_uuid_stream_is_v4_and_fresh() {
    let generator = GeneratorBuilder::new()
        .define("id", "uuid()")
        .with_seed(17)
        .build()
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..20 {
        match generator.next("id").unwrap() {
            Datum::Uuid(id) => {
                assert_eq!(id.get_version_num(), 4);
                assert!(!seen.contains(&id));
                seen.push(id);
            }
            other => panic!("expected uuid, got {other:?}"),
        }
    }
}

#[test]
fn test_time_transformer_over_now() {
    let generator = GeneratorBuilder::new()
        .define("stamp", "time('%Y-%m-%d', nowLocalDate())")
        .build()
        .unwrap();

    let out = generator.next("stamp").unwrap();
    let text = out.as_text().unwrap();
    assert_eq!(text.len(), 10);
    assert_eq!(text.as_bytes()[4], b'-');
    assert_eq!(text.as_bytes()[7], b'-');
}

#[test]
fn test_naked_string_definition_spans_whole_expression() {
    let generator = GeneratorBuilder::new()
        .define("motd", "all systems nominal")
        .build()
        .unwrap();

    assert_eq!(
        generator.next("motd").unwrap(),
        Datum::Text("all systems nominal".to_string())
    );
}

#[test]
fn test_build_failures_surface_expected_kinds() {
    assert!(matches!(
        GeneratorBuilder::new().define("a", "random([])").build(),
        Err(Error::Arity(_))
    ));
    assert!(matches!(
        GeneratorBuilder::new().define("a", "random(9..2)").build(),
        Err(Error::InvalidRange(_))
    ));
    assert!(matches!(
        GeneratorBuilder::new().define("a", "$nope").build(),
        Err(Error::InvalidReferenceName(_))
    ));
    assert!(matches!(
        GeneratorBuilder::new()
            .define("a", "random([1], normal(1))")
            .build(),
        Err(Error::Arity(_))
    ));
}

#[test]
fn test_list_record_advances_all_members() {
    let generator = GeneratorBuilder::new()
        .define("row", "list([circular([1, 2]), 'fixed'])")
        .build()
        .unwrap();

    let first = generator.next("row").unwrap();
    let second = generator.next("row").unwrap();
    assert_eq!(
        first,
        Datum::List(vec![Datum::Long(1), Datum::Text("fixed".to_string())])
    );
    assert_eq!(
        second,
        Datum::List(vec![Datum::Long(2), Datum::Text("fixed".to_string())])
    );
}

//! Integration tests for building validators and validating instances.

use json_schema_engine::{
    validate, BuildError, Dialect, EngineError, LogLevel, MapLoader, NoLoader, SchemaValidator,
    ValidationReport, ValidatorBuilder, ValidatorOptions,
};
use serde_json::{json, Value};
use url::Url;

fn build(schema: &Value) -> SchemaValidator {
    ValidatorBuilder::new().loader(NoLoader).build(schema).unwrap()
}

fn error_pointers(report: &ValidationReport) -> Vec<String> {
    report.errors().map(|m| m.pointer.to_string()).collect()
}

fn person_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 1}
        }
    })
}

// === Reported locations ===

mod locations {
    use super::*;

    #[test]
    fn min_length_violation_is_reported_at_the_member() {
        let report = build(&person_schema()).validate(&json!({"name": ""})).unwrap();
        assert!(!report.is_success());
        assert_eq!(error_pointers(&report), vec!["/name"]);
        assert_eq!(report.messages()[0].keyword.as_deref(), Some("minLength"));
        assert!(report.iter().all(|m| m.keyword.as_deref() != Some("required")));
    }

    #[test]
    fn missing_required_property_is_reported_at_the_root() {
        let report = build(&person_schema()).validate(&json!({})).unwrap();
        assert_eq!(report.error_count(), 1);
        assert_eq!(error_pointers(&report), vec![""]);
        assert_eq!(report.messages()[0].keyword.as_deref(), Some("required"));
    }

    #[test]
    fn array_elements_in_index_order() {
        let validator = build(&json!({"type": "array", "items": {"type": "integer"}}));
        let report = validator.validate(&json!([1, "x", 3, "y"])).unwrap();
        assert_eq!(error_pointers(&report), vec!["/1", "/3"]);
    }

    #[test]
    fn object_members_in_sorted_key_order() {
        let validator = build(&json!({"additionalProperties": {"type": "string"}}));
        let report = validator.validate(&json!({"b": 1, "c": 2, "a": 3})).unwrap();
        assert_eq!(error_pointers(&report), vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn escaped_pointer_tokens() {
        let validator = build(&json!({"properties": {"a/b": {"type": "null"}, "m~n": {"type": "null"}}}));
        let report = validator.validate(&json!({"a/b": 1, "m~n": 2})).unwrap();
        assert_eq!(error_pointers(&report), vec!["/a~1b", "/m~0n"]);
    }

    #[test]
    fn messages_carry_schema_locations() {
        let report = build(&person_schema()).validate(&json!({"name": ""})).unwrap();
        assert_eq!(
            report.messages()[0].schema.as_deref(),
            Some("memory:///root.json#/properties/name")
        );
    }
}

// === Recursion rules ===

mod recursion {
    use super::*;

    #[test]
    fn structural_failure_stops_descent() {
        let validator = build(&json!({
            "type": "object",
            "minProperties": 2,
            "properties": {"a": {"type": "string"}}
        }));
        let report = validator.validate(&json!({"a": 1})).unwrap();
        assert_eq!(error_pointers(&report), vec![""]);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn applicator_failure_stops_descent() {
        let validator = build(&json!({
            "allOf": [{"required": ["b"]}],
            "properties": {"a": {"type": "string"}}
        }));
        let report = validator.validate(&json!({"a": 1})).unwrap();
        assert_eq!(error_pointers(&report), vec![""]);
    }

    #[test]
    fn structural_failure_skips_applicators_for_containers() {
        let validator = build(&json!({"maxItems": 0, "contains": {"type": "string"}}));
        let report = validator.validate(&json!([1])).unwrap();
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.messages()[0].keyword.as_deref(), Some("maxItems"));
    }

    #[test]
    fn scalars_run_applicators_after_structural_failure() {
        let validator = build(&json!({"minLength": 5, "anyOf": [{"pattern": "^z"}]}));
        let report = validator.validate(&json!("abc")).unwrap();
        let keywords: Vec<_> = report.errors().filter_map(|m| m.keyword.clone()).collect();
        assert_eq!(keywords, vec!["minLength", "anyOf"]);
    }

    #[test]
    fn every_child_is_visited() {
        let validator = build(&json!({"items": {"type": "string"}}));
        let report = validator.validate(&json!([1, 2, 3])).unwrap();
        assert_eq!(report.error_count(), 3);
    }

    #[test]
    fn keywords_for_other_types_are_silent() {
        let validator = build(&json!({"minLength": 3, "required": ["a"], "minItems": 1}));
        let report = validator.validate(&json!(5)).unwrap();
        assert!(report.is_success());
        assert!(report.is_empty());
    }

    #[test]
    fn false_schema_rejects_everything() {
        let validator = build(&json!({"properties": {"a": false}}));
        assert!(validator.is_valid(&json!({"b": 1})).unwrap());
        let report = validator.validate(&json!({"a": null})).unwrap();
        assert_eq!(error_pointers(&report), vec!["/a"]);
    }
}

// === References ===

mod references {
    use super::*;

    #[test]
    fn local_definitions() {
        let validator = build(&json!({
            "definitions": {"positive": {"type": "integer", "minimum": 1}},
            "items": {"$ref": "#/definitions/positive"}
        }));
        let report = validator.validate(&json!([1, 0, "2"])).unwrap();
        assert_eq!(error_pointers(&report), vec!["/1", "/2"]);
    }

    #[test]
    fn ref_overrides_siblings() {
        let validator = build(&json!({
            "definitions": {"any": {}},
            "properties": {"a": {"$ref": "#/definitions/any", "type": "string"}}
        }));
        assert!(validator.is_valid(&json!({"a": 1})).unwrap());
    }

    #[test]
    fn recursive_schema() {
        let validator = build(&json!({
            "type": "object",
            "properties": {
                "value": {"type": "integer"},
                "next": {"$ref": "#"}
            }
        }));
        let instance = json!({"value": 1, "next": {"value": 2, "next": {"value": "3"}}});
        let report = validator.validate(&instance).unwrap();
        assert_eq!(error_pointers(&report), vec!["/next/next/value"]);
    }

    #[test]
    fn ref_cycle_fails_the_build() {
        let schema = json!({
            "definitions": {
                "a": {"$ref": "#/definitions/b"},
                "b": {"$ref": "#/definitions/a"}
            },
            "$ref": "#/definitions/a"
        });
        let err = ValidatorBuilder::new().loader(NoLoader).build(&schema).unwrap_err();
        match err {
            BuildError::Engine(EngineError::RefResolution { chain }) => {
                let (last, rest) = chain.split_last().unwrap();
                assert!(rest.contains(last));
                assert!(last.ends_with("#/definitions/a"));
            }
            other => panic!("expected a reference cycle, got {other:?}"),
        }
    }

    #[test]
    fn dangling_ref_fails_the_build() {
        let err = ValidatorBuilder::new()
            .loader(NoLoader)
            .build(&json!({"items": {"$ref": "#/definitions/missing"}}))
            .unwrap_err();
        assert!(matches!(err, BuildError::Engine(EngineError::DanglingRef { .. })));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn unloadable_document_fails_the_build() {
        let err = ValidatorBuilder::new()
            .loader(NoLoader)
            .build(&json!({"$ref": "other.json"}))
            .unwrap_err();
        assert!(matches!(err, BuildError::Engine(EngineError::Load { .. })));
    }

    #[test]
    fn external_documents_come_from_the_loader() {
        let loader = MapLoader::new().with(
            "http://example.com/types.json",
            json!({"definitions": {"id": {"type": "string", "pattern": "^[a-z]+$"}}}),
        );
        let validator = ValidatorBuilder::new()
            .loader(loader)
            .base_uri(Url::parse("http://example.com/root.json").unwrap())
            .build(&json!({"properties": {"id": {"$ref": "types.json#/definitions/id"}}}))
            .unwrap();
        assert_eq!(validator.tree().document_count(), 2);
        assert!(validator.is_valid(&json!({"id": "abc"})).unwrap());
        let report = validator.validate(&json!({"id": "ABC"})).unwrap();
        assert_eq!(error_pointers(&report), vec!["/id"]);
        assert!(report.messages()[0]
            .schema
            .as_deref()
            .unwrap()
            .starts_with("http://example.com/types.json#"));
    }

    #[test]
    fn embedded_ids_resolve_without_loading() {
        let validator = build(&json!({
            "$id": "http://example.com/root.json",
            "definitions": {
                "name": {"$id": "#name", "type": "string"},
                "nested": {"$id": "nested.json", "type": "integer"}
            },
            "properties": {
                "a": {"$ref": "#name"},
                "b": {"$ref": "nested.json"}
            }
        }));
        assert_eq!(validator.tree().document_count(), 1);
        assert!(validator.is_valid(&json!({"a": "x", "b": 1})).unwrap());
        assert!(!validator.is_valid(&json!({"a": 1})).unwrap());
        assert!(!validator.is_valid(&json!({"b": "x"})).unwrap());
    }

    #[test]
    fn percent_encoded_fragments() {
        let validator = build(&json!({
            "definitions": {"a b": {"type": "null"}},
            "$ref": "#/definitions/a%20b"
        }));
        assert!(validator.is_valid(&json!(null)).unwrap());
        assert!(!validator.is_valid(&json!(0)).unwrap());
    }

    #[test]
    fn self_application_loop_aborts_validation() {
        let validator = build(&json!({"allOf": [{"$ref": "#"}]}));
        let err = validator.validate(&json!(1)).unwrap_err();
        assert!(matches!(err, EngineError::ValidationLoop { .. }));
    }
}

// === Syntax ===

mod syntax {
    use super::*;

    #[test]
    fn syntax_errors_are_all_reported() {
        let err = ValidatorBuilder::new()
            .loader(NoLoader)
            .build(&json!({
                "minLength": "one",
                "properties": {"a": {"maxItems": -1}, "b": {"type": "strin"}}
            }))
            .unwrap_err();
        let report = err.syntax_report().unwrap();
        assert_eq!(report.error_count(), 3);
        let pointers: Vec<_> = report.iter().map(|m| m.pointer.to_string()).collect();
        assert!(pointers.contains(&"/minLength".to_string()));
        assert!(pointers.contains(&"/properties/a/maxItems".to_string()));
        assert!(pointers.contains(&"/properties/b/type".to_string()));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn unknown_keywords_are_ignored() {
        let validator = build(&json!({"x-vendor": {"minLength": "not checked"}, "type": "string"}));
        assert!(validator.syntax_report().is_empty());
        assert!(validator.is_valid(&json!("s")).unwrap());
    }

    #[test]
    fn warnings_are_kept_on_the_validator() {
        let validator = build(&json!({"format": "color"}));
        let report = validator.syntax_report();
        assert!(report.is_success());
        assert_eq!(report.messages()[0].level, LogLevel::Warning);
        assert!(validator.is_valid(&json!("anything")).unwrap());
    }

    #[test]
    fn schemas_only_reachable_through_refs_are_checked() {
        let err = ValidatorBuilder::new()
            .loader(NoLoader)
            .build(&json!({
                "x-store": {"bad": {"minimum": "zero"}},
                "$ref": "#/x-store/bad"
            }))
            .unwrap_err();
        assert_eq!(err.syntax_report().unwrap().error_count(), 1);
    }
}

// === Dialects ===

mod dialects {
    use super::*;

    #[test]
    fn dialect_follows_schema_uri() {
        let draft4 = build(&json!({"$schema": "http://json-schema.org/draft-04/schema#"}));
        assert_eq!(draft4.library().dialect(), Dialect::Draft4);
        assert_eq!(build(&json!({})).library().dialect(), Dialect::Draft7);
    }

    #[test]
    fn draft4_has_no_const() {
        let validator = build(&json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "const": 1
        }));
        assert!(validator.is_valid(&json!(2)).unwrap());
        assert!(!build(&json!({"const": 1})).is_valid(&json!(2)).unwrap());
    }

    #[test]
    fn draft4_rejects_boolean_subschemas() {
        let err = ValidatorBuilder::new()
            .loader(NoLoader)
            .build(&json!({
                "$schema": "http://json-schema.org/draft-04/schema#",
                "properties": {"a": true}
            }))
            .unwrap_err();
        assert!(err.syntax_report().is_some());
    }
}

// === Options ===

mod options {
    use super::*;

    #[test]
    fn log_level_filters_messages_not_the_verdict() {
        let validator = ValidatorBuilder::new()
            .loader(NoLoader)
            .options(ValidatorOptions::new().log_level(LogLevel::Fatal))
            .build(&person_schema())
            .unwrap();
        let report = validator.validate(&json!({"name": ""})).unwrap();
        assert!(report.is_empty());
        assert!(!report.is_success());
    }

    #[test]
    fn max_depth_stops_with_a_fatal_message() {
        let validator = ValidatorBuilder::new()
            .loader(NoLoader)
            .options(ValidatorOptions::new().max_depth(2))
            .build(&json!({"items": {"$ref": "#"}}))
            .unwrap();
        assert!(validator.is_valid(&json!([[1]])).unwrap());
        let report = validator.validate(&json!([[[1]]])).unwrap();
        assert!(!report.is_success());
        let fatal: Vec<_> = report.iter().filter(|m| m.level == LogLevel::Fatal).collect();
        assert_eq!(fatal.len(), 1);
        assert_eq!(fatal[0].pointer.to_string(), "/0/0/0");
    }
}

// === Determinism and sharing ===

mod determinism {
    use super::*;

    fn sample_schema() -> Value {
        json!({
            "type": "object",
            "required": ["id", "tags"],
            "properties": {
                "id": {"type": "integer", "minimum": 1},
                "tags": {"type": "array", "items": {"type": "string"}, "uniqueItems": true},
                "meta": {"additionalProperties": {"type": "number"}}
            }
        })
    }

    #[test]
    fn repeated_validation_gives_identical_reports() {
        let validator = build(&sample_schema());
        let instance = json!({"id": 0, "tags": ["a", 1, "a"], "meta": {"z": "x", "y": true}});
        let first = validator.validate(&instance).unwrap();
        let second = validator.validate(&instance).unwrap();
        let fresh = build(&sample_schema()).validate(&instance).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, fresh);
    }

    #[test]
    fn one_shot_validate_matches_built_validator() {
        let instance = json!({"id": "1", "tags": []});
        let one_shot = validate(&sample_schema(), &instance).unwrap();
        let built = build(&sample_schema()).validate(&instance).unwrap();
        assert_eq!(one_shot, built);
    }

    #[test]
    fn identical_fragments_share_one_validator() {
        let validator = build(&json!({
            "properties": {
                "a": {"type": "string", "minLength": 2},
                "b": {"minLength": 2, "type": "string"}
            }
        }));
        assert_eq!(validator.cache().len(), 2);
    }

    #[test]
    fn reordered_required_shares_one_validator() {
        let validator = build(&json!({
            "properties": {
                "a": {"required": ["x", "y"]},
                "b": {"required": ["y", "x"]}
            }
        }));
        assert_eq!(validator.cache().len(), 1);
    }

    #[test]
    fn concurrent_validation() {
        let validator = build(&sample_schema());
        let instance = json!({"id": 5, "tags": ["x", 2]});
        let expected = validator.validate(&instance).unwrap();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| validator.validate(&instance).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}

// === Report serialization ===

mod serialization {
    use super::*;

    #[test]
    fn report_serializes_to_json() {
        let report = build(&person_schema()).validate(&json!({"name": ""})).unwrap();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["success"], json!(false));
        let message = &value["messages"][0];
        assert_eq!(message["level"], json!("error"));
        assert_eq!(message["domain"], json!("validation"));
        assert_eq!(message["pointer"], json!("/name"));
        assert_eq!(message["keyword"], json!("minLength"));
    }

    #[test]
    fn text_rendering() {
        let report = build(&person_schema()).validate(&json!({"name": ""})).unwrap();
        assert!(report.to_string().starts_with("/name: [error] "));
    }
}

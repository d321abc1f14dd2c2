use cilow_compiler::{CompileConfig, ExternRegistry};

use super::unit_loader::{Loaded, UnitFile};

const ADD_UNIT: &str = r#"{
  "unit": {
    "name": "Demo",
    "methods": [
      {
        "method": {
          "declaring": { "Class": "Demo" },
          "name": "Add",
          "params": ["Int32", "Int32"],
          "ret": "Int32",
          "is_static": true
        },
        "code": "02 03 58 2A",
        "export": true
      }
    ]
  }
}"#;

fn loaded(text: &str, externs: Option<ExternRegistry>) -> Loaded {
    let file: UnitFile = serde_json::from_str(text).unwrap();
    Loaded {
        file,
        config: CompileConfig::default(),
        externs,
    }
}

#[test]
fn unit_file_compiles_with_naming_rules() {
    let program = loaded(ADD_UNIT, None).compile().unwrap();

    assert!(program.entry("Add").unwrap().exported);
    assert!(program.data_entry("__Add_arg1").is_some());
}

#[test]
fn extern_allow_list_is_enforced() {
    let err = loaded(ADD_UNIT, Some(ExternRegistry::new()))
        .compile()
        .unwrap_err();

    assert!(
        err.to_string().contains("is not available on the target"),
        "{err}"
    );
}

#[test]
fn tokens_load_from_string_keys() {
    let text = r#"{
      "unit": { "name": "Demo" },
      "tokens": {
        "167772161": {
          "kind": "method",
          "declaring": { "Class": "UnityEngine.Debug" },
          "name": "Log",
          "params": ["Object"],
          "is_static": true
        },
        "1879048193": { "kind": "string", "value": "hello" }
      }
    }"#;
    let file: UnitFile = serde_json::from_str(text).unwrap();

    assert_eq!(file.tokens.len(), 2);
    assert!(file.unit.methods.is_empty());
}

#[test]
fn odd_hex_rejected() {
    let text = ADD_UNIT.replace("02 03 58 2A", "02 03 58 2");

    let err = serde_json::from_str::<UnitFile>(&text).unwrap_err();

    assert!(err.to_string().contains("odd number of hex digits"), "{err}");
}

use muvuku_schema::ir::FieldType;
use muvuku_schema::legacy::{extract_file, extract_source, symbol_table, LegacyForm, Symbol};
use muvuku_schema::{compile_document, CompileOptions, DiagnosticCode, ExtractOptions};

const SOURCE: &str = r#"
const u8 PROGMEM lc_code_reg[] = "REG";
const u8 PROGMEM lc_code_muvu[] = "MUVU";
const u8 PROGMEM lc_yes_en[] = "Yes";
const u8 PROGMEM lc_no_en[] = "No";
const u8 PROGMEM lc_yes_fr[] = "Oui";
const u8 PROGMEM lc_no_fr[] = "Non";
const u8 PROGMEM lc_age[] = "Age";

const u8 *PROGMEM lc_boolean_en[] = {
    lc_yes_en,
    lc_no_en
};

const u8 *PROGMEM lc_boolean_fr[] = {
    lc_yes_fr,
    lc_no_fr
};

const lc_list PROGMEM lc_boolean[] = {
    LC_EN_LIST((const u8 *) lc_boolean_en)
    LC_FR_LIST((const u8 *) lc_boolean_fr)
    LC_END_LIST
};

lc_char PROGMEM lc_patient_name[] = {
    LC_EN("Patient name")
    LC_FR("Nom de la mari\5e")
    LC_END
};

lc_char PROGMEM lc_pregnant[] = {
    LC_EN("Pregnant")
    LC_FR("Enceinte")
    LC_END
};

schema_t *muvuku_settings(void) {
    SCHEMA_BEGIN(rv, lc_code_muvu, 1);
        SCHEMA_ITEM(locale(lc_phone_sms), TS_PHONE, 4, 20);
    SCHEMA_END();
}

schema_t *broken(void) {
    SCHEMA_BEGIN(rv, lc_code_reg);
        SCHEMA_ITEM(locale(lc_patient_name), TS_STRING, 1, 20);
    SCHEMA_END();
}

schema_t *registration(void) {
    SCHEMA_BEGIN(rv, lc_code_reg, 4);
        SCHEMA_ITEM(locale(lc_patient_name), TS_STRING, 1, 20);
            SCHEMA_ITEM_VALIDATE(IS_REQUIRED);
            SCHEMA_ITEM_FLAGS(FL_NO_ECHO);
        SCHEMA_ITEM(locale(lc_pregnant), TS_SELECT, 1, 1);
            SCHEMA_ITEM_SELECT(2, keys_boolean, locale_list(lc_boolean));
        SCHEMA_ITEM(locale(lc_age), TS_INTEGER, 1, 3);
            SCHEMA_ITEM_SELECT(2, keys_boolean, locale_list(lc_missing));
        SCHEMA_ITEM("x1", TS_STRING, 1, 4);
    SCHEMA_END();
}
"#;

fn extract(locale: &str) -> Vec<LegacyForm> {
    extract_source(SOURCE, &ExtractOptions::new(locale)).expect("extract")
}

#[test]
fn symbol_table_sees_every_declaration() {
    let table = symbol_table(SOURCE).expect("symbols");
    assert_eq!(table.raw_string("lc_code_reg"), Some("REG"));
    assert!(matches!(table.get("lc_boolean"), Some(Symbol::LocalizedList(_))));
    assert!(matches!(table.get("lc_pregnant"), Some(Symbol::LocalizedString(_))));
    assert!(table.get("lc_missing").is_none());
}

#[test]
fn skips_reserved_and_malformed_blocks() {
    let forms = extract("en");
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].meta.code.as_deref(), Some("REG"));
    assert_eq!(forms[0].fields.len(), 4);
}

#[test]
fn lifts_fields_for_the_requested_locale() {
    let form = extract("fr").remove(0);
    let keys: Vec<&str> = form.fields.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["patient_name", "pregnant", "age", "x1"]);

    let name = &form.fields["patient_name"];
    assert_eq!(name.position, 0);
    assert_eq!(
        name.labels.short["fr"].as_deref(),
        Some("Nom de la mariée")
    );
    assert_eq!(name.field_type, Some(FieldType::String));
    assert_eq!(name.length, [1, 20]);
    assert!(name.validations.contains_key("is_required"));
    assert!(name.flags.contains_key("no_echo"));
    assert!(name.list.is_none());

    let pregnant = &form.fields["pregnant"];
    assert_eq!(pregnant.field_type, Some(FieldType::Integer));
    let list = pregnant.list.as_ref().expect("choices");
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].0, 1);
    assert_eq!(list[1].1["fr"].as_deref(), Some("Non"));

    let age = &form.fields["age"];
    assert_eq!(age.labels.short["fr"].as_deref(), Some("Age"));
    assert!(age.list.is_none());

    let unresolved = &form.fields["x1"];
    assert_eq!(unresolved.position, 3);
    assert_eq!(unresolved.labels.short.get("fr"), Some(&None));
}

#[test]
fn extracted_forms_compile_again() {
    let forms = extract("en");
    let json = serde_json::to_string(&forms).expect("serialize");
    let compiled = compile_document(&json, None, &CompileOptions::default()).expect("compile");

    assert_eq!(compiled.len(), 1);
    let form = &compiled[0];
    assert_eq!(form.meta.code, "reg");
    assert_eq!(form.meta.count, 4);
    assert_eq!(form.meta.length.upper, 7 + 20 + 1 + 3 + 4);
    assert_eq!(form.fieldmap["pregnant"].field_type, FieldType::Select);
    assert_eq!(form.lists["pregnant"].map["en"].list[0].value, "Yes");
    assert_eq!(form.strings["lc_reg_patient_name"].list[0].value, "Patient name");
    assert_eq!(form.fieldmap["x1"].comment, "x1");
}

#[test]
fn missing_source_file_is_reported() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let err = extract_file(&tmp.path().join("absent.c"), &ExtractOptions::default()).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::MVK0001ReadFailed);
}

#[test]
fn extracts_from_a_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("forms.c");
    std::fs::write(&path, SOURCE).expect("write source");
    let forms = extract_file(&path, &ExtractOptions::default()).expect("extract");
    assert_eq!(forms, extract("en"));
}

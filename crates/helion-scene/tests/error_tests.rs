//! Failure-path coverage: every error is located and uses the canonical
//! `Error while loading ...` template.

mod common;

use common::{load_err, test_loader};
use helion_runtime::{ClassRegistry, PluginManager};
use helion_scene::SceneLoader;

#[test]
fn malformed_document() {
    let message = load_err("<scene version=\"2.0.0\"><shape></scene>");
    assert!(message.starts_with("Error while loading \"<string>\""));
}

#[test]
fn missing_root_version() {
    let message = load_err("<scene/>");
    assert!(message.contains("missing version attribute in root element \"scene\""));
}

#[test]
fn malformed_version() {
    let message = load_err(r#"<scene version="2.0"/>"#);
    assert!(message.contains("could not parse version number \"2.0\""));
}

#[test]
fn unknown_tag() {
    let message = load_err(r#"<scene version="2.0.0"><widget name="w"/></scene>"#);
    assert!(message.contains("unexpected tag \"widget\""));
}

#[test]
fn root_must_be_an_object() {
    let message = load_err(r#"<float name="x" value="1" version="2.0.0"/>"#);
    assert!(message.contains("root element \"float\" must be an object"));
}

#[test]
fn unexpected_attribute() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="sphere" id="s" radius="1"/></scene>"#,
    );
    assert!(message.contains("unexpected attribute \"radius\" in element \"shape\""));
}

#[test]
fn missing_attribute() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><float name="radius"/></shape></scene>"#,
    );
    assert!(message.contains("missing attribute \"value\" in element \"float\""));
}

#[test]
fn error_location_points_at_offending_line() {
    let message = load_err(
        "<scene version=\"2.0.0\">\n    <shape type=\"sphere\" id=\"s\">\n        <float name=\"radius\" value=\"abc\"/>\n    </shape>\n</scene>",
    );
    assert!(message.contains("(at line 3, col"), "message: {message}");
    assert!(message.contains("could not parse floating point value \"abc\""));
    assert!(message.ends_with('.'));
}

#[test]
fn trailing_garbage_in_numbers() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><float name="r" value="1.5abc"/></shape></scene>"#,
    );
    assert!(message.contains("could not parse floating point value \"1.5abc\""));

    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><integer name="n" value="7 8"/></shape></scene>"#,
    );
    assert!(message.contains("could not parse integer value \"7 8\""));
}

#[test]
fn boolean_must_be_lowercase() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><boolean name="b" value="True"/></shape></scene>"#,
    );
    assert!(message.contains("could not parse boolean value \"True\""));
}

#[test]
fn reserved_identifier_prefixes() {
    let message = load_err(r#"<scene version="2.0.0"><shape type="s" id="_hidden"/></scene>"#);
    assert!(message.contains("leading underscores are reserved"));

    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><float name="_radius" value="1"/></shape></scene>"#,
    );
    assert!(message.contains("leading underscores are reserved"));
}

#[test]
fn duplicate_id_reports_first_location() {
    let message = load_err(
        "<scene version=\"2.0.0\">\n    <shape type=\"sphere\" id=\"x\"/>\n    <shape type=\"sphere\" id=\"x\"/>\n</scene>",
    );
    assert!(message.contains("duplicate id \"x\""));
    // the first occurrence on line 2 is named inside the message ...
    assert!(message.contains("previous was at line 2"), "message: {message}");
    // ... and the offending element's own location wraps the error
    assert!(message.contains("at line 3"), "message: {message}");
}

#[test]
fn transform_op_outside_transform() {
    let message =
        load_err(r#"<scene version="2.0.0"><shape type="s" id="x"><translate x="1"/></shape></scene>"#);
    assert!(message.contains("transform operations can only occur in a transform node"));
}

#[test]
fn non_op_inside_transform() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><transform name="t"><float name="v" value="1"/></transform></shape></scene>"#,
    );
    assert!(message.contains("transform nodes can only contain transform operations"));
}

#[test]
fn value_and_xyz_cannot_mix() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><transform name="t"><translate value="1" x="2"/></transform></shape></scene>"#,
    );
    assert!(message.contains("can't mix and match \"value\" and \"x\"/\"y\"/\"z\" attributes"));
}

#[test]
fn matrix_requires_sixteen_values() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><transform name="t"><matrix value="1 0 0 1"/></transform></shape></scene>"#,
    );
    assert!(message.contains("matrix: expected 16 values"));
}

#[test]
fn degenerate_lookat_is_rejected() {
    let message = load_err(
        r#"<scene version="2.0.0"><sensor type="s" id="cam"><transform name="t"><lookat origin="0 0 0" target="0 1 0" up="0 1 0"/></transform></sensor></scene>"#,
    );
    assert!(message.contains("invalid lookat transformation"));
}

#[test]
fn rgb_reflectance_out_of_range() {
    let message = load_err(
        r#"<scene version="2.0.0"><bsdf type="diffuse" id="m"><rgb name="reflectance" value="1.5"/></bsdf></scene>"#,
    );
    assert!(message.contains("invalid RGB reflectance value"));
}

#[test]
fn wavelengths_must_increase() {
    let message = load_err(
        r#"<scene version="2.0.0"><bsdf type="diffuse" id="m"><spectrum name="r" value="500:1 400:1"/></bsdf></scene>"#,
    );
    assert!(message.contains("wavelengths must be specified in increasing order"));
}

#[test]
fn irregular_spectrum_rejected() {
    let message = load_err(
        r#"<scene version="2.0.0"><bsdf type="diffuse" id="m"><spectrum name="r" value="400:1 500:1 650:1"/></bsdf></scene>"#,
    );
    assert!(message.contains("irregularly sampled spectra are not supported"));
}

#[test]
fn unknown_reference_is_reported_near_referrer() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><ref id="ghost" name="material"/></shape></scene>"#,
    );
    assert!(message.contains("reference to unknown object \"ghost\""));
    assert!(message.contains("(near "), "message: {message}");
}

#[test]
fn alias_source_must_exist() {
    let message = load_err(r#"<scene version="2.0.0"><alias id="ghost" as="other"/></scene>"#);
    assert!(message.contains("referenced id \"ghost\" not found"));
}

#[test]
fn alias_target_must_be_fresh() {
    let message = load_err(
        r#"<scene version="2.0.0"><bsdf type="d" id="a"/><bsdf type="d" id="b"/><alias id="a" as="b"/></scene>"#,
    );
    assert!(message.contains("duplicate id \"b\""));
}

#[test]
fn circular_references_are_detected() {
    let message = load_err(
        r#"<scene version="2.0.0">
            <shape type="s" id="a"><ref id="b" name="peer"/></shape>
            <shape type="s" id="b"><ref id="a" name="peer"/></shape>
        </scene>"#,
    );
    assert!(message.contains("circular object reference"), "message: {message}");
}

#[test]
fn unqueried_property_is_an_error() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="strict" id="s"><float name="value" value="1"/><float name="extra" value="2"/></shape></scene>"#,
    );
    assert!(message.contains("unreferenced property \"extra\""), "message: {message}");
    assert!(message.contains("in shape plugin of type \"strict\""));
}

#[test]
fn unreferenced_nested_object_is_an_error() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="strict" id="s"><float name="value" value="1"/><bsdf type="diffuse" name="unused"/></shape></scene>"#,
    );
    assert!(message.contains("unreferenced object"), "message: {message}");
}

#[test]
fn factory_failures_are_wrapped() {
    let mut registry = ClassRegistry::new();
    registry.register("scene", "scalar-rgb");
    registry.register("shape", "scalar-rgb");
    let mut plugins = PluginManager::new();
    plugins.register(
        "scene",
        Box::new(|class, props| {
            let names: Vec<String> = props.iter().map(|(n, _)| n.to_owned()).collect();
            for name in names {
                props.mark_queried(&name);
            }
            Ok(std::sync::Arc::new(common::TestObject {
                class: class.clone(),
                object_id: props.id().to_owned(),
                plugin: props.plugin_name().to_owned(),
                captured: Vec::new(),
                expansions: Vec::new(),
            }) as helion_runtime::SceneObjectRef)
        }),
    );
    let loader = SceneLoader::new(registry, plugins);

    let err = loader
        .load_string(
            r#"<scene version="2.0.0"><shape type="missing" id="s"/></scene>"#,
            "scalar-rgb",
            &[],
        )
        .unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains("could not instantiate shape plugin of type \"missing\""),
        "message: {message}"
    );
    assert!(message.contains("unknown plugin \"missing\""));
}

#[test]
fn misplaced_property_under_scalar() {
    let message = load_err(
        r#"<scene version="2.0.0"><shape type="s" id="x"><float name="a" value="1"><float name="b" value="2"/></float></shape></scene>"#,
    );
    assert!(message.contains("cannot occur as child of a property"));
}

#[test]
fn stray_text_content_is_rejected() {
    let message =
        load_err(r#"<scene version="2.0.0"><shape type="s" id="x">stray</shape></scene>"#);
    assert!(message.contains("unexpected content"));
}

#[test]
fn monochrome_errors_match_color_variant() {
    let (loader, _) = test_loader("scalar-mono");
    let err = loader
        .load_string(
            r#"<scene version="2.0.0"><bsdf type="d" id="m"><rgb name="reflectance" value="2"/></bsdf></scene>"#,
            "scalar-mono",
            &[],
        )
        .unwrap_err();
    assert!(err.to_string().contains("invalid RGB reflectance value"));
}

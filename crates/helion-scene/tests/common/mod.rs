//! Shared test fixtures: a loader wired to a mock plugin set that captures
//! every property it is handed.

// Not every test binary exercises every helper.
#![allow(dead_code)]

use helion_runtime::{
    Class, ClassRegistry, FileResolver, PluginManager, Properties, SceneObject, SceneObjectRef,
    Value,
};
use helion_scene::SceneLoader;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// Object classes registered for every test loader.
pub const TEST_CLASSES: &[&str] = &[
    "scene",
    "integrator",
    "sensor",
    "shape",
    "bsdf",
    "emitter",
    "spectrum",
];

/// A scene object that records the property bag it was built from.
pub struct TestObject {
    pub class: Class,
    pub object_id: String,
    pub plugin: String,
    pub captured: Vec<(String, Value)>,
    pub expansions: Vec<SceneObjectRef>,
}

impl SceneObject for TestObject {
    fn class(&self) -> &Class {
        &self.class
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn id(&self) -> &str {
        &self.object_id
    }

    fn expand(&self) -> Vec<SceneObjectRef> {
        self.expansions.clone()
    }
}

impl TestObject {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.captured
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn child(&self, name: &str) -> Option<SceneObjectRef> {
        match self.get(name) {
            Some(Value::Object(obj)) => Some(obj.clone()),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Float(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Downcast a scene object handle to the test type.
pub fn as_test(obj: &SceneObjectRef) -> &TestObject {
    obj.as_any()
        .downcast_ref::<TestObject>()
        .expect("object constructed by the test plugin set")
}

/// Records every factory invocation as `plugin:id`.
#[derive(Default)]
pub struct CreationLog(pub Mutex<Vec<String>>);

impl CreationLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_of(&self, plugin: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(&format!("{plugin}:")))
            .count()
    }
}

/// Drain a property bag, marking everything queried.
fn capture(props: &mut Properties) -> Vec<(String, Value)> {
    let names: Vec<String> = props.iter().map(|(n, _)| n.to_owned()).collect();
    let mut captured = Vec::with_capacity(names.len());
    for name in names {
        if let Some(value) = props.get(&name) {
            captured.push((name.clone(), value.clone()));
        }
        props.mark_queried(&name);
    }
    captured
}

fn test_object(class: &Class, props: &mut Properties, log: &CreationLog) -> TestObject {
    log.0
        .lock()
        .unwrap()
        .push(format!("{}:{}", props.plugin_name(), props.id()));
    TestObject {
        class: class.clone(),
        object_id: props.id().to_owned(),
        plugin: props.plugin_name().to_owned(),
        captured: capture(props),
        expansions: Vec::new(),
    }
}

/// Build a loader whose plugin set accepts any plugin name and captures all
/// properties. Returns the loader together with its creation log.
pub fn test_loader(variant: &str) -> (SceneLoader, Arc<CreationLog>) {
    build_loader(variant, None)
}

/// Same as [`test_loader`], with a custom file resolver for include tests.
pub fn build_loader(
    variant: &str,
    resolver: Option<Arc<dyn FileResolver>>,
) -> (SceneLoader, Arc<CreationLog>) {
    let mut registry = ClassRegistry::new();
    for tag in TEST_CLASSES {
        registry.register(tag, variant);
    }

    let log = Arc::new(CreationLog::default());
    let mut plugins = PluginManager::new();

    let catch_log = log.clone();
    plugins.set_catch_all(Box::new(move |class, props| {
        Ok(Arc::new(test_object(class, props, &catch_log)) as SceneObjectRef)
    }));

    // Queries only its "value" property; everything else stays unqueried.
    let strict_log = log.clone();
    plugins.register(
        "strict",
        Box::new(move |class, props| {
            strict_log
                .0
                .lock()
                .unwrap()
                .push(format!("strict:{}", props.id()));
            let value = props.float("value")?;
            Ok(Arc::new(TestObject {
                class: class.clone(),
                object_id: props.id().to_owned(),
                plugin: "strict".to_owned(),
                captured: vec![("value".to_owned(), Value::Float(value))],
                expansions: Vec::new(),
            }) as SceneObjectRef)
        }),
    );

    // Expands into two replacement objects.
    let pair_log = log.clone();
    plugins.register(
        "pair",
        Box::new(move |class, props| {
            let mut inner = test_object(class, props, &pair_log);
            let make = |suffix: &str| {
                Arc::new(TestObject {
                    class: inner.class.clone(),
                    object_id: format!("{}_{suffix}", inner.object_id),
                    plugin: "expanded".to_owned(),
                    captured: Vec::new(),
                    expansions: Vec::new(),
                }) as SceneObjectRef
            };
            inner.expansions = vec![make("a"), make("b")];
            Ok(Arc::new(inner) as SceneObjectRef)
        }),
    );

    let loader = match resolver {
        Some(resolver) => SceneLoader::with_resolver(registry, plugins, resolver),
        None => SceneLoader::new(registry, plugins),
    };
    (loader, log)
}

/// Shorthand: load a scene string with a fresh `scalar-rgb` test loader.
pub fn load(text: &str) -> Result<SceneObjectRef, helion_scene::LoadError> {
    let (loader, _) = test_loader("scalar-rgb");
    loader.load_string(text, "scalar-rgb", &[])
}

/// Shorthand: load and expect failure, returning the rendered message.
pub fn load_err(text: &str) -> String {
    match load(text) {
        Ok(_) => panic!("expected load to fail"),
        Err(e) => e.to_string(),
    }
}

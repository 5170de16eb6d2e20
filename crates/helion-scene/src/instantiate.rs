//! Pass 2: parallel materialization of the descriptor table.
//!
//! Instantiation happens in two phases. A sequential dependency scan walks
//! the named references reachable from the root, rejecting unknown ids and
//! circular references, and assigns every descriptor a topological level
//! (dependencies below dependents). Each level is then built with a rayon
//! `par_iter`, leaves first, so by the time a descriptor is constructed all
//! of its references are already memoized. No lock is ever held while
//! waiting on a child, which rules out the steal-back deadlock a naive
//! recursive join would invite.

use crate::document;
use crate::error::LoadError;
use crate::parser::Descriptor;
use crate::SceneLoader;
use helion_runtime::{Properties, SceneObjectRef, Value};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub(crate) struct Instantiator<'a> {
    loader: &'a SceneLoader,
    descriptors: HashMap<String, Descriptor>,
    sources: HashMap<String, Arc<str>>,
}

impl<'a> Instantiator<'a> {
    pub fn new(
        loader: &'a SceneLoader,
        descriptors: HashMap<String, Descriptor>,
        sources: HashMap<String, Arc<str>>,
    ) -> Self {
        Self {
            loader,
            descriptors,
            sources,
        }
    }

    /// Materialize the object graph rooted at `root_id`.
    pub fn instantiate(&self, root_id: &str) -> Result<SceneObjectRef, LoadError> {
        let levels = self.schedule(root_id)?;
        for ids in &levels {
            ids.par_iter().try_for_each(|id| self.build(id))?;
        }
        self.resolved(root_id)
    }

    /// Wrap an error with a descriptor's provenance, unless it already
    /// carries one.
    fn near(&self, desc: &Descriptor, error: impl ToString) -> LoadError {
        let location = match self.sources.get(&desc.src_id) {
            Some(text) => document::offset_to_location(text, desc.offset),
            None => format!("byte offset {}", desc.offset),
        };
        LoadError::near(&desc.src_id, location, error)
    }

    /// Dependency scan: group reachable descriptors into topological levels.
    ///
    /// Aliases are chased but not scheduled; they have nothing to build.
    fn schedule(&self, root_id: &str) -> Result<Vec<Vec<String>>, LoadError> {
        let mut memo: HashMap<String, usize> = HashMap::new();
        let mut visiting: HashSet<String> = HashSet::new();
        self.assign_level(root_id, None, &mut memo, &mut visiting)?;

        let depth = memo.values().copied().max().map_or(0, |d| d + 1);
        let mut levels = vec![Vec::new(); depth];
        for (id, level) in memo {
            levels[level].push(id);
        }
        Ok(levels)
    }

    fn assign_level(
        &self,
        id: &str,
        referrer: Option<&Descriptor>,
        memo: &mut HashMap<String, usize>,
        visiting: &mut HashSet<String>,
    ) -> Result<usize, LoadError> {
        let desc = self.descriptors.get(id).ok_or_else(|| {
            let message = format!("reference to unknown object \"{id}\"");
            match referrer {
                Some(parent) => self.near(parent, message),
                None => LoadError::message(message),
            }
        })?;

        // Alias chains forward to their (non-alias) target
        if let Some(target) = &desc.alias {
            return self.assign_level(target, referrer, memo, visiting);
        }

        if let Some(level) = memo.get(id) {
            return Ok(*level);
        }
        if !visiting.insert(id.to_owned()) {
            return Err(self.near(
                desc,
                format!("circular object reference involving id \"{id}\""),
            ));
        }

        let mut level = 0;
        for (_, referent) in desc.props.named_references() {
            let child = self.assign_level(&referent, Some(desc), memo, visiting)?;
            level = level.max(child + 1);
        }

        visiting.remove(id);
        memo.insert(id.to_owned(), level);
        Ok(level)
    }

    /// Build a single descriptor: bind its (already materialized)
    /// references, run the factory, and check for unqueried properties.
    fn build(&self, id: &str) -> Result<(), LoadError> {
        let desc = self
            .descriptors
            .get(id)
            .ok_or_else(|| LoadError::message(format!("reference to unknown object \"{id}\"")))?;
        let class = desc
            .class
            .as_ref()
            .ok_or_else(|| self.near(desc, format!("object \"{id}\" has no class")))?;

        {
            let slot = desc.instance.lock().unwrap_or_else(|p| p.into_inner());
            if slot.is_some() {
                return Ok(());
            }
        }

        let mut props = desc.props.clone();
        for (ref_name, referent) in props.named_references() {
            let object = self.resolved(&referent)?;

            // The object may expand into replacements that are bound in its
            // place; several expansions bind under indexed names.
            let expanded = object.expand();
            match expanded.len() {
                0 => props.replace(&ref_name, Value::Object(object)),
                1 => props.replace(&ref_name, Value::Object(expanded[0].clone())),
                _ => {
                    props.remove(&ref_name);
                    for (index, child) in expanded.iter().enumerate() {
                        props.replace(format!("{ref_name}_{index}"), Value::Object(child.clone()));
                    }
                }
            }
        }

        let object = self
            .loader
            .plugins()
            .create(class, &mut props)
            .map_err(|e| {
                self.near(
                    desc,
                    format!(
                        "could not instantiate {} plugin of type \"{}\": {e}",
                        class.name(),
                        props.plugin_name()
                    ),
                )
            })?;

        self.check_unqueried(desc, &props)?;

        let mut slot = desc.instance.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(object);
        }
        Ok(())
    }

    /// Properties the factory never read are user errors.
    fn check_unqueried(&self, desc: &Descriptor, props: &Properties) -> Result<(), LoadError> {
        let unqueried = props.unqueried();
        if unqueried.is_empty() {
            return Ok(());
        }
        let class_name = desc
            .class
            .as_ref()
            .map(|c| c.name().to_owned())
            .unwrap_or_default();
        for name in &unqueried {
            if let Some(Value::Object(object)) = props.get(name) {
                return Err(self.near(
                    desc,
                    format!(
                        "unreferenced object {} (within {} of type \"{}\")",
                        object.summary(),
                        class_name,
                        props.plugin_name()
                    ),
                ));
            }
        }
        let quoted: Vec<String> = unqueried.iter().map(|n| format!("\"{n}\"")).collect();
        Err(self.near(
            desc,
            format!(
                "unreferenced {} {} in {} plugin of type \"{}\"",
                if quoted.len() > 1 {
                    "properties"
                } else {
                    "property"
                },
                quoted.join(", "),
                class_name,
                props.plugin_name()
            ),
        ))
    }

    /// Look up the memoized instance for `id`, following alias chains.
    fn resolved(&self, id: &str) -> Result<SceneObjectRef, LoadError> {
        let mut current = id;
        loop {
            let desc = self.descriptors.get(current).ok_or_else(|| {
                LoadError::message(format!("reference to unknown object \"{current}\""))
            })?;
            match &desc.alias {
                Some(target) => current = target,
                None => {
                    let slot = desc.instance.lock().unwrap_or_else(|p| p.into_inner());
                    return slot.clone().ok_or_else(|| {
                        LoadError::message(format!("object \"{current}\" was never instantiated"))
                    });
                }
            }
        }
    }
}

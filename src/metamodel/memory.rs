//! An in-memory reference [`Metamodel`] implementation.
//!
//! Stands in for the external object store described in §6 across this
//! crate's unit and integration tests. Grounded in
//! `src/semantic/symbol_table/table.rs`'s arena-plus-name-index pattern:
//! classes and instances are indexed by plain maps rather than pointers,
//! matching §9's "represent objects by stable ids in an arena."

use super::{ClassId, FeatureInfo, Metamodel, ObjectRef};
use crate::error::MetamodelError;
use crate::value::Value;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
struct ClassDef {
    name: String,
    superclass: Option<String>,
    features: Vec<FeatureInfo>,
}

#[derive(Debug, Clone)]
struct Instance {
    class: String,
    features: IndexMap<String, Value>,
}

#[derive(Debug, Clone)]
struct ModelData {
    alias: String,
    is_source: bool,
    classes: FxHashMap<String, ClassDef>,
    instances: Vec<Instance>,
}

/// A small in-process model store keyed by alias, used by tests in place
/// of a real reflective object graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryModel {
    models: Vec<ModelData>,
    alias_to_index: FxHashMap<String, u32>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model resource under `alias`. `is_source` marks it
    /// read-only (writes fail with `ReadOnlyModel`).
    pub fn register_model(&mut self, alias: &str, is_source: bool) {
        let idx = self.models.len() as u32;
        self.models.push(ModelData {
            alias: alias.to_string(),
            is_source,
            classes: FxHashMap::default(),
            instances: Vec::new(),
        });
        self.alias_to_index.insert(alias.to_string(), idx);
    }

    /// Declare a class, optionally extending `superclass` (by bare name,
    /// within the same model).
    pub fn register_class(
        &mut self,
        alias: &str,
        class_name: &str,
        superclass: Option<&str>,
        features: Vec<FeatureInfo>,
    ) {
        let model = self.model_mut_by_alias(alias).expect("unknown model alias");
        model.classes.insert(
            class_name.to_string(),
            ClassDef {
                name: class_name.to_string(),
                superclass: superclass.map(str::to_string),
                features,
            },
        );
    }

    /// Seed an instance directly (for building source-model test fixtures),
    /// returning its `ObjectRef`. Unset declared features default to `Null`.
    pub fn seed_instance(
        &mut self,
        alias: &str,
        class_name: &str,
        values: Vec<(&str, Value)>,
    ) -> ObjectRef {
        let model_idx = *self
            .alias_to_index
            .get(alias)
            .expect("unknown model alias");
        let model = &mut self.models[model_idx as usize];
        let mut features = IndexMap::new();
        if let Some(all) = Self::declared_features(&model.classes, class_name) {
            for f in all {
                features.insert(f.name.clone(), Value::Null);
            }
        }
        for (name, value) in values {
            features.insert(name.to_string(), value);
        }
        let id = model.instances.len() as u64;
        model.instances.push(Instance {
            class: class_name.to_string(),
            features,
        });
        ObjectRef { model: model_idx, id }
    }

    fn model_mut_by_alias(&mut self, alias: &str) -> Option<&mut ModelData> {
        let idx = *self.alias_to_index.get(alias)?;
        self.models.get_mut(idx as usize)
    }

    fn model_by_alias(&self, alias: &str) -> Option<&ModelData> {
        let idx = *self.alias_to_index.get(alias)?;
        self.models.get(idx as usize)
    }

    fn declared_features(
        classes: &FxHashMap<String, ClassDef>,
        class_name: &str,
    ) -> Option<Vec<FeatureInfo>> {
        let mut out = Vec::new();
        let mut current = classes.get(class_name)?;
        loop {
            out.extend(current.features.iter().cloned());
            match &current.superclass {
                Some(sup) => current = classes.get(sup)?,
                None => break,
            }
        }
        Some(out)
    }

    fn is_kind_of_in(classes: &FxHashMap<String, ClassDef>, sub: &str, sup: &str) -> bool {
        let mut current = sub;
        loop {
            if current == sup {
                return true;
            }
            match classes.get(current).and_then(|c| c.superclass.as_deref()) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    fn split_qualified(class: &ClassId) -> Option<(&str, &str)> {
        class.0.split_once('!')
    }
}

impl Metamodel for MemoryModel {
    fn resolve_classifier(
        &self,
        model_alias: &str,
        class_name: &str,
    ) -> Result<ClassId, MetamodelError> {
        let model = self
            .model_by_alias(model_alias)
            .ok_or_else(|| MetamodelError::UnknownClass(class_name.to_string()))?;
        if model.classes.contains_key(class_name) {
            Ok(ClassId::new(format!("{model_alias}!{class_name}")))
        } else {
            Err(MetamodelError::UnknownClass(class_name.to_string()))
        }
    }

    fn features(&self, class: &ClassId) -> Result<Vec<FeatureInfo>, MetamodelError> {
        let (alias, name) =
            Self::split_qualified(class).ok_or_else(|| MetamodelError::UnknownClass(class.0.clone()))?;
        let model = self
            .model_by_alias(alias)
            .ok_or_else(|| MetamodelError::UnknownClass(class.0.clone()))?;
        Self::declared_features(&model.classes, name)
            .ok_or_else(|| MetamodelError::UnknownClass(class.0.clone()))
    }

    fn is_kind_of(&self, sub: &ClassId, sup: &ClassId) -> bool {
        let (Some((alias_sub, name_sub)), Some((alias_sup, name_sup))) =
            (Self::split_qualified(sub), Self::split_qualified(sup))
        else {
            return false;
        };
        if alias_sub != alias_sup {
            return false;
        }
        match self.model_by_alias(alias_sub) {
            Some(model) => Self::is_kind_of_in(&model.classes, name_sub, name_sup),
            None => false,
        }
    }

    fn create_instance(
        &mut self,
        model_alias: &str,
        class: &ClassId,
    ) -> Result<ObjectRef, MetamodelError> {
        let (alias, name) =
            Self::split_qualified(class).ok_or_else(|| MetamodelError::UnknownClass(class.0.clone()))?;
        if alias != model_alias {
            return Err(MetamodelError::UnknownClass(class.0.clone()));
        }
        let model_idx = *self
            .alias_to_index
            .get(model_alias)
            .ok_or_else(|| MetamodelError::UnknownClass(class.0.clone()))?;
        {
            let model = &self.models[model_idx as usize];
            if model.is_source {
                return Err(MetamodelError::ReadOnlyModel);
            }
        }
        let declared = {
            let model = &self.models[model_idx as usize];
            Self::declared_features(&model.classes, name)
                .ok_or_else(|| MetamodelError::UnknownClass(class.0.clone()))?
        };
        let model = &mut self.models[model_idx as usize];
        let mut features = IndexMap::new();
        for f in declared {
            features.insert(f.name, Value::Null);
        }
        let id = model.instances.len() as u64;
        model.instances.push(Instance {
            class: name.to_string(),
            features,
        });
        Ok(ObjectRef { model: model_idx, id })
    }

    fn read_feature(&self, obj: ObjectRef, feature: &str) -> Result<Value, MetamodelError> {
        let model = self
            .models
            .get(obj.model as usize)
            .ok_or(MetamodelError::WrongKind)?;
        let instance = model
            .instances
            .get(obj.id as usize)
            .ok_or(MetamodelError::WrongKind)?;
        instance
            .features
            .get(feature)
            .cloned()
            .ok_or_else(|| MetamodelError::UnknownFeature(feature.to_string(), instance.class.clone()))
    }

    fn write_feature(
        &mut self,
        obj: ObjectRef,
        feature: &str,
        value: Value,
    ) -> Result<(), MetamodelError> {
        let model = self
            .models
            .get_mut(obj.model as usize)
            .ok_or(MetamodelError::WrongKind)?;
        if model.is_source {
            return Err(MetamodelError::ReadOnlyModel);
        }
        let instance = model
            .instances
            .get_mut(obj.id as usize)
            .ok_or(MetamodelError::WrongKind)?;
        if !instance.features.contains_key(feature) {
            return Err(MetamodelError::UnknownFeature(
                feature.to_string(),
                instance.class.clone(),
            ));
        }
        instance.features.insert(feature.to_string(), value);
        Ok(())
    }

    fn class_of(&self, obj: ObjectRef) -> Result<ClassId, MetamodelError> {
        let model = self
            .models
            .get(obj.model as usize)
            .ok_or(MetamodelError::WrongKind)?;
        let instance = model
            .instances
            .get(obj.id as usize)
            .ok_or(MetamodelError::WrongKind)?;
        Ok(ClassId::new(format!("{}!{}", model.alias, instance.class)))
    }

    fn instances_of(
        &self,
        model_alias: &str,
        class: &ClassId,
    ) -> Result<Vec<ObjectRef>, MetamodelError> {
        let model_idx = *self
            .alias_to_index
            .get(model_alias)
            .ok_or_else(|| MetamodelError::UnknownClass(class.0.clone()))?;
        let model = &self.models[model_idx as usize];
        let (_, name) =
            Self::split_qualified(class).ok_or_else(|| MetamodelError::UnknownClass(class.0.clone()))?;
        let mut out = Vec::new();
        for (id, instance) in model.instances.iter().enumerate() {
            if Self::is_kind_of_in(&model.classes, &instance.class, name) {
                out.push(ObjectRef {
                    model: model_idx,
                    id: id as u64,
                });
            }
        }
        Ok(out)
    }

    fn resolve(&self, model_alias: &str, obj: ObjectRef) -> Result<ObjectRef, MetamodelError> {
        let model = self
            .models
            .get(obj.model as usize)
            .ok_or(MetamodelError::WrongKind)?;
        if model.alias != model_alias {
            return Err(MetamodelError::WrongKind);
        }
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryModel {
        let mut mm = MemoryModel::new();
        mm.register_model("IN", true);
        mm.register_model("OUT", false);
        mm.register_class(
            "IN",
            "Member",
            None,
            vec![
                FeatureInfo {
                    name: "firstName".into(),
                    upper_bound: Some(1),
                    containment: false,
                },
                FeatureInfo {
                    name: "isMale".into(),
                    upper_bound: Some(1),
                    containment: false,
                },
            ],
        );
        mm.register_class(
            "OUT",
            "Person",
            None,
            vec![FeatureInfo {
                name: "fullName".into(),
                upper_bound: Some(1),
                containment: false,
            }],
        );
        mm
    }

    #[test]
    fn resolve_and_create() {
        let mut mm = sample();
        let class = mm.resolve_classifier("OUT", "Person").unwrap();
        let obj = mm.create_instance("OUT", &class).unwrap();
        assert_eq!(mm.read_feature(obj, "fullName").unwrap().is_null(), true);
    }

    #[test]
    fn source_model_is_read_only() {
        let mut mm = sample();
        let class = mm.resolve_classifier("IN", "Member").unwrap();
        assert!(matches!(
            mm.create_instance("IN", &class),
            Err(MetamodelError::ReadOnlyModel)
        ));
    }

    #[test]
    fn instances_of_preserves_insertion_order() {
        let mut mm = sample();
        let a = mm.seed_instance("IN", "Member", vec![("firstName", Value::String("A".into()))]);
        let b = mm.seed_instance("IN", "Member", vec![("firstName", Value::String("B".into()))]);
        let class = mm.resolve_classifier("IN", "Member").unwrap();
        let all = mm.instances_of("IN", &class).unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[test]
    fn unknown_feature_is_an_error() {
        let mut mm = sample();
        let obj = mm.seed_instance("IN", "Member", vec![]);
        assert!(matches!(
            mm.read_feature(obj, "nope"),
            Err(MetamodelError::UnknownFeature(_, _))
        ));
    }
}

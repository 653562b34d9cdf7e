//! Component dependency and exclusivity rules.
//!
//! Dependencies match by declared key only. A declaration against a concrete
//! component type is satisfied by that exact type; a declaration against an
//! interface marker is satisfied by any component whose registration
//! `provides` that marker. Supertypes are never inferred.

use std::any::TypeId;

use smallvec::SmallVec;

use crate::cog::Cog;
use crate::component::{ComponentRegistry, TypeKey};
use crate::error::DependencyError;

/// A cog below the one being edited, with the cogs strictly between the two
pub struct Descendant<'c> {
    pub cog: &'c Cog,
    pub between: Vec<&'c Cog>,
}

fn check_required<'c>(
    required: SmallVec<[(TypeKey, &'static str); 2]>,
    ancestors: impl IntoIterator<Item = &'c Cog>,
) -> Result<(), DependencyError> {
    if required.is_empty() {
        return Ok(());
    }
    let ancestors: Vec<&Cog> = ancestors.into_iter().collect();
    for (ancestor, component) in required {
        if !ancestors.iter().any(|a| a.is_indexed(ancestor.id)) {
            return Err(DependencyError::MissingAncestor {
                component,
                ancestor: ancestor.name,
            });
        }
    }
    Ok(())
}

/// Validates component additions and removals before a cog is mutated
pub struct ComponentDependencyResolver<'a> {
    registry: &'a ComponentRegistry,
}

impl<'a> ComponentDependencyResolver<'a> {
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self { registry }
    }

    /// Check adding a single component of type `candidate`
    pub fn can_add<'c>(
        &self,
        cog: &Cog,
        ancestors: impl IntoIterator<Item = &'c Cog>,
        candidate: TypeKey,
    ) -> Result<(), DependencyError> {
        self.can_add_batch(cog, ancestors, &[candidate])
    }

    /// Check adding several components at once; dependencies may be met by
    /// other members of the batch
    pub fn can_add_batch<'c>(
        &self,
        cog: &Cog,
        ancestors: impl IntoIterator<Item = &'c Cog>,
        candidates: &[TypeKey],
    ) -> Result<(), DependencyError> {
        let batch_keys: SmallVec<[TypeId; 8]> = candidates
            .iter()
            .flat_map(|c| self.registry.index_keys(c.id))
            .collect();
        let present = |type_id: TypeId| cog.is_indexed(type_id) || batch_keys.contains(&type_id);

        for (i, candidate) in candidates.iter().enumerate() {
            let name = self.name(*candidate);
            if cog.has_exact(candidate.id) || candidates[..i].iter().any(|c| c.id == candidate.id) {
                return Err(DependencyError::Duplicate { component: name });
            }

            let Some(info) = self.registry.get(candidate.id) else {
                self.check_reverse_exclusivity(cog, candidates, *candidate)?;
                continue;
            };

            for dependency in &info.dependencies {
                if !present(dependency.id) {
                    return Err(DependencyError::MissingDependency {
                        component: name,
                        dependency: dependency.name,
                    });
                }
            }

            for excluded in &info.exclusive_with {
                if let Some(existing) = self.indexed_name(cog, excluded.id) {
                    return Err(DependencyError::ExclusiveConflict {
                        component: name,
                        existing,
                    });
                }
                if let Some(other) = candidates.iter().find(|c| {
                    c.id != candidate.id && self.registry.index_keys(c.id).contains(&excluded.id)
                }) {
                    return Err(DependencyError::ExclusiveConflict {
                        component: name,
                        existing: self.name(*other),
                    });
                }
            }
            self.check_reverse_exclusivity(cog, candidates, *candidate)?;
        }

        let required: SmallVec<[(TypeKey, &'static str); 2]> = candidates
            .iter()
            .filter_map(|c| self.registry.get(c.id))
            .flat_map(|info| info.required_ancestors.iter().map(move |a| (*a, info.name())))
            .collect();
        check_required(required, ancestors)
    }

    /// Check that every `requires_ancestor` declaration of the components
    /// already on `cog` is met by `ancestors`
    pub fn check_ancestors<'c>(
        &self,
        cog: &Cog,
        ancestors: impl IntoIterator<Item = &'c Cog>,
    ) -> Result<(), DependencyError> {
        let required: SmallVec<[(TypeKey, &'static str); 2]> = cog
            .component_types()
            .into_iter()
            .filter_map(|t| self.registry.get(t))
            .flat_map(|info| info.required_ancestors.iter().map(move |a| (*a, info.name())))
            .collect();
        check_required(required, ancestors)
    }

    /// Present components (and other batch members) that exclude `candidate`
    fn check_reverse_exclusivity(
        &self,
        cog: &Cog,
        candidates: &[TypeKey],
        candidate: TypeKey,
    ) -> Result<(), DependencyError> {
        let candidate_keys = self.registry.index_keys(candidate.id);
        let existing = cog.component_types();
        let others = candidates
            .iter()
            .map(|c| c.id)
            .filter(|id| *id != candidate.id);

        for type_id in existing.into_iter().chain(others) {
            let Some(info) = self.registry.get(type_id) else {
                continue;
            };
            if info
                .exclusive_with
                .iter()
                .any(|x| candidate_keys.contains(&x.id))
            {
                return Err(DependencyError::ExclusiveConflict {
                    component: self.name(candidate),
                    existing: info.name(),
                });
            }
        }
        Ok(())
    }

    /// Check removing the exact-typed component `target` from `cog`.
    ///
    /// `requires_ancestor` declarations on `descendants` may still be met by
    /// a cog between the descendant and `cog`, or by one of `ancestors`.
    pub fn can_remove<'c>(
        &self,
        cog: &Cog,
        ancestors: impl IntoIterator<Item = &'c Cog>,
        descendants: impl IntoIterator<Item = Descendant<'c>>,
        target: TypeKey,
    ) -> Result<(), DependencyError> {
        let removed_keys = self.registry.index_keys(target.id);
        // A key stays satisfied if some other component is indexed under it
        let still_present = |cog: &Cog, key: TypeId| {
            cog.component_types()
                .into_iter()
                .filter(|t| *t != target.id)
                .any(|t| self.registry.index_keys(t).contains(&key))
        };

        for type_id in cog.component_types() {
            if type_id == target.id {
                continue;
            }
            let Some(info) = self.registry.get(type_id) else {
                continue;
            };
            for dependency in &info.dependencies {
                if removed_keys.contains(&dependency.id) && !still_present(cog, dependency.id) {
                    return Err(DependencyError::RequiredBy {
                        component: self.name(target),
                        dependent: info.name(),
                    });
                }
            }
        }

        let ancestors: Vec<&Cog> = ancestors.into_iter().collect();
        for descendant in descendants {
            let provided_elsewhere = |key: TypeId| {
                descendant
                    .between
                    .iter()
                    .chain(ancestors.iter())
                    .any(|a| a.is_indexed(key))
            };
            for type_id in descendant.cog.component_types() {
                let Some(info) = self.registry.get(type_id) else {
                    continue;
                };
                for ancestor in &info.required_ancestors {
                    if removed_keys.contains(&ancestor.id)
                        && !still_present(cog, ancestor.id)
                        && !provided_elsewhere(ancestor.id)
                    {
                        return Err(DependencyError::RequiredBy {
                            component: self.name(target),
                            dependent: info.name(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn name(&self, key: TypeKey) -> &'static str {
        self.registry
            .get(key.id)
            .map(|info| info.name())
            .unwrap_or(key.name)
    }

    /// Registered name of the first component indexed under `type_id`
    fn indexed_name(&self, cog: &Cog, type_id: TypeId) -> Option<&'static str> {
        let component = cog.first_indexed(type_id)?;
        let exact = component.as_any().type_id();
        Some(self.registry.name_of(exact, component))
    }
}

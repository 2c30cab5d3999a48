//! Local registry of clients, vendors, companies, consultants and the
//! projects linking them, stored as `entities.toml` in the data directory.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::RateMode;

pub const REGISTRY_FILE: &str = "entities.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    Client,
    Vendor,
    Company,
    Consultant,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Client,
        EntityKind::Vendor,
        EntityKind::Company,
        EntityKind::Consultant,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Client => "Client",
            EntityKind::Vendor => "Vendor",
            EntityKind::Company => "Company",
            EntityKind::Consultant => "Consultant",
        }
    }

    fn default_type2(&self) -> &'static str {
        match self {
            EntityKind::Client | EntityKind::Vendor => "Company",
            EntityKind::Company => "Technology",
            EntityKind::Consultant => "Individual",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Entity {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    pub type2: String,
    /// Engagement kind, consultants only (`InHouse`, `Outsourced`...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Fields supplied when creating or updating an entity.
#[derive(Debug, Clone, Default)]
pub struct EntityDraft {
    pub name: String,
    pub email: Option<String>,
    pub country: Option<String>,
    pub mobile: Option<String>,
    pub type2: Option<String>,
    pub type3: Option<String>,
    pub address: Option<String>,
}

impl EntityDraft {
    fn into_entity(self, id: u64, kind: EntityKind) -> Entity {
        let type3 = match kind {
            EntityKind::Consultant => Some(self.type3.unwrap_or_else(|| "InHouse".to_string())),
            _ => None,
        };
        Entity {
            id,
            name: self.name,
            email: self.email,
            country: self.country,
            mobile: self.mobile,
            type2: self.type2.unwrap_or_else(|| kind.default_type2().to_string()),
            type3,
            address: self.address,
        }
    }
}

/// A project: who gives the work, who takes it, and how it is billed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProjectRecord {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_by_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken_by_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_mode: Option<RateMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_amount: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Registry {
    #[serde(default)]
    pub clients: Vec<Entity>,
    #[serde(default)]
    pub vendors: Vec<Entity>,
    #[serde(default)]
    pub companies: Vec<Entity>,
    #[serde(default)]
    pub consultants: Vec<Entity>,
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
}

fn next_id<I: Iterator<Item = u64>>(ids: I) -> u64 {
    ids.max().map_or(1, |max| max + 1)
}

impl Registry {
    pub fn list(&self, kind: EntityKind) -> &[Entity] {
        match kind {
            EntityKind::Client => &self.clients,
            EntityKind::Vendor => &self.vendors,
            EntityKind::Company => &self.companies,
            EntityKind::Consultant => &self.consultants,
        }
    }

    fn list_mut(&mut self, kind: EntityKind) -> &mut Vec<Entity> {
        match kind {
            EntityKind::Client => &mut self.clients,
            EntityKind::Vendor => &mut self.vendors,
            EntityKind::Company => &mut self.companies,
            EntityKind::Consultant => &mut self.consultants,
        }
    }

    pub fn get(&self, kind: EntityKind, id: u64) -> Result<&Entity> {
        self.list(kind)
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::not_found(kind.label()))
    }

    pub fn create(&mut self, kind: EntityKind, draft: EntityDraft) -> Result<&Entity> {
        if draft.name.trim().is_empty() {
            return Err(Error::validation(format!("{} name is required", kind.label())));
        }
        let list = self.list_mut(kind);
        let id = next_id(list.iter().map(|e| e.id));
        list.push(draft.into_entity(id, kind));
        Ok(&list[list.len() - 1])
    }

    pub fn update(&mut self, kind: EntityKind, id: u64, draft: EntityDraft) -> Result<&Entity> {
        let entity = self
            .list_mut(kind)
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::not_found(kind.label()))?;
        *entity = draft.into_entity(id, kind);
        Ok(entity)
    }

    pub fn delete(&mut self, kind: EntityKind, id: u64) -> Result<()> {
        let list = self.list_mut(kind);
        let before = list.len();
        list.retain(|e| e.id != id);
        if list.len() == before {
            return Err(Error::not_found(kind.label()));
        }
        Ok(())
    }

    /// Every entity of every kind, for picking project parties.
    pub fn all_entities(&self) -> Vec<(EntityKind, &Entity)> {
        EntityKind::ALL
            .iter()
            .flat_map(|kind| self.list(*kind).iter().map(move |e| (*kind, e)))
            .collect()
    }

    pub fn get_project(&self, id: u64) -> Result<&ProjectRecord> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::not_found("Project"))
    }

    /// Assigns the next id, ignoring whatever id `project` carries.
    pub fn create_project(&mut self, mut project: ProjectRecord) -> Result<&ProjectRecord> {
        if project.name.trim().is_empty() {
            return Err(Error::validation("Project name is required"));
        }
        if project.rate_amount.is_some_and(|r| !r.is_finite() || r < 0.0) {
            return Err(Error::validation("Rate amount must be a non-negative number"));
        }
        project.id = next_id(self.projects.iter().map(|p| p.id));
        self.projects.push(project);
        Ok(&self.projects[self.projects.len() - 1])
    }

    pub fn update_project(&mut self, id: u64, mut project: ProjectRecord) -> Result<&ProjectRecord> {
        let slot = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::not_found("Project"))?;
        project.id = id;
        *slot = project;
        Ok(slot)
    }

    pub fn delete_project(&mut self, id: u64) -> Result<()> {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        if self.projects.len() == before {
            return Err(Error::not_found("Project"));
        }
        Ok(())
    }
}

pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join(REGISTRY_FILE) }
    }

    pub fn load(&self) -> Result<Registry> {
        if !self.path.exists() {
            return Ok(Registry::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, registry: &Registry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(registry)?)?;
        info!(path = %self.path.display(), "saved entity registry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn draft(name: &str) -> EntityDraft {
        EntityDraft { name: name.into(), country: Some("India".into()), ..Default::default() }
    }

    #[test]
    fn ids_continue_from_the_largest() {
        let mut registry = Registry::default();
        assert_eq!(registry.create(EntityKind::Client, draft("A")).unwrap().id, 1);
        assert_eq!(registry.create(EntityKind::Client, draft("B")).unwrap().id, 2);
        registry.delete(EntityKind::Client, 1).unwrap();
        assert_eq!(registry.create(EntityKind::Client, draft("C")).unwrap().id, 3);
        // kinds number independently
        assert_eq!(registry.create(EntityKind::Vendor, draft("V")).unwrap().id, 1);
    }

    #[test]
    fn defaults_depend_on_kind() {
        let mut registry = Registry::default();
        let consultant = registry.create(EntityKind::Consultant, draft("Dev")).unwrap().clone();
        assert_eq!(consultant.type2, "Individual");
        assert_eq!(consultant.type3.as_deref(), Some("InHouse"));

        let company = registry.create(EntityKind::Company, draft("Co")).unwrap();
        assert_eq!(company.type2, "Technology");
        assert_eq!(company.type3, None);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let mut registry = Registry::default();
        assert!(registry.get(EntityKind::Vendor, 7).unwrap_err().is_not_found());
        assert!(registry.update(EntityKind::Vendor, 7, draft("x")).unwrap_err().is_not_found());
        assert!(registry.delete(EntityKind::Vendor, 7).unwrap_err().is_not_found());
        assert!(registry.delete_project(1).unwrap_err().is_not_found());
    }

    #[test]
    fn update_keeps_id() {
        let mut registry = Registry::default();
        registry.create(EntityKind::Client, draft("Old")).unwrap();
        let updated = registry.update(EntityKind::Client, 1, draft("New")).unwrap();
        assert_eq!(updated.id, 1);
        assert_eq!(updated.name, "New");
    }

    #[test]
    fn registry_round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let store = RegistryStore::new(dir.path());
        let mut registry = store.load().unwrap();
        registry.create(EntityKind::Client, draft("Acme")).unwrap();
        registry
            .create_project(ProjectRecord {
                id: 0,
                name: "Migration".into(),
                description: None,
                start_date: Some("2025-01-01".into()),
                end_date: None,
                given_by: Some("Acme".into()),
                given_by_id: Some(1),
                taken_by: None,
                taken_by_id: None,
                rate_mode: Some(RateMode::Hourly),
                rate_amount: Some(45.0),
                currency: "EUR".into(),
            })
            .unwrap();
        store.save(&registry).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(loaded.get_project(1).unwrap().rate_mode, Some(RateMode::Hourly));
    }

    #[test]
    fn all_entities_spans_kinds() {
        let mut registry = Registry::default();
        registry.create(EntityKind::Client, draft("C")).unwrap();
        registry.create(EntityKind::Consultant, draft("D")).unwrap();
        let all = registry.all_entities();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].0, EntityKind::Consultant);
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut registry = Registry::default();
        assert!(matches!(registry.create(EntityKind::Client, draft("  ")), Err(Error::Validation(_))));
    }
}

//! Ordered plugin registry shared by fraud rules and event sinks.
//!
//! A registry is assembled once at startup through [`RegistryBuilder`] and
//! is immutable afterwards, so it can be read from any task without locks.
//! Ordering is computed once in [`RegistryBuilder::build`] with a stable
//! sort: entries with equal order keep their registration order. Disabled
//! entries stay in the registry for introspection but are skipped by
//! [`PluginRegistry::all_enabled`].

use std::sync::Arc;

/// Metadata every registered plugin carries.
pub trait Descriptor {
    /// Unique plugin name.
    fn name(&self) -> &str;

    /// Sort key, lower runs first.
    fn order(&self) -> i32;

    /// Whether the plugin participates in iteration.
    fn is_enabled(&self) -> bool;
}

/// A plugin paired with its descriptor.
#[derive(Debug)]
pub struct RegistryEntry<P: ?Sized, D> {
    /// Shared handle to the plugin.
    pub plugin: Arc<P>,

    /// Immutable metadata.
    pub descriptor: D,
}

impl<P: ?Sized, D: Clone> Clone for RegistryEntry<P, D> {
    fn clone(&self) -> Self {
        Self { plugin: Arc::clone(&self.plugin), descriptor: self.descriptor.clone() }
    }
}

/// Collects plugins during startup.
#[derive(Debug)]
pub struct RegistryBuilder<P: ?Sized, D> {
    entries: Vec<RegistryEntry<P, D>>,
}

impl<P: ?Sized, D: Descriptor> RegistryBuilder<P, D> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registers a plugin with its descriptor.
    #[must_use]
    pub fn register(mut self, plugin: Arc<P>, descriptor: D) -> Self {
        self.entries.push(RegistryEntry { plugin, descriptor });
        self
    }

    /// Number of registered plugins so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the registry, sorting entries by ascending order.
    pub fn build(self) -> PluginRegistry<P, D> {
        let mut entries = self.entries;
        // `sort_by_key` is stable, so ties keep registration order.
        entries.sort_by_key(|entry| entry.descriptor.order());

        let enabled = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.descriptor.is_enabled())
            .map(|(index, _)| index)
            .collect();

        PluginRegistry { entries, enabled }
    }
}

impl<P: ?Sized, D: Descriptor> Default for RegistryBuilder<P, D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable, ordered collection of plugins.
#[derive(Debug)]
pub struct PluginRegistry<P: ?Sized, D> {
    entries: Vec<RegistryEntry<P, D>>,
    enabled: Vec<usize>,
}

impl<P: ?Sized, D: Descriptor> PluginRegistry<P, D> {
    /// Starts a new builder.
    pub fn builder() -> RegistryBuilder<P, D> {
        RegistryBuilder::new()
    }

    /// Enabled entries in execution order.
    pub fn all_enabled(&self) -> impl Iterator<Item = &RegistryEntry<P, D>> + '_ {
        self.enabled.iter().map(move |&index| &self.entries[index])
    }

    /// Number of enabled entries.
    pub fn enabled_count(&self) -> usize {
        self.enabled.len()
    }

    /// All entries in execution order, including disabled ones.
    pub fn entries(&self) -> &[RegistryEntry<P, D>] {
        &self.entries
    }

    /// Looks up an entry by descriptor name.
    pub fn find(&self, name: &str) -> Option<&RegistryEntry<P, D>> {
        self.entries.iter().find(|entry| entry.descriptor.name() == name)
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

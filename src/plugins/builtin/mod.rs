//! Plugins shipped with the bot.

pub mod admin;
pub mod example;
pub mod greet;

use super::PluginCatalog;

/// Every bundled plugin module.
pub fn catalog() -> PluginCatalog {
    PluginCatalog::new(vec![admin::module(), greet::module(), example::module()])
}

#[cfg(test)]
mod tests {
    #[test]
    fn catalog_names() {
        let catalog = super::catalog();
        let names: Vec<_> = catalog.names().collect();
        assert_eq!(names, vec!["admin", "greet", "example"]);
        assert!(catalog.find("greet").is_some());
        assert!(catalog.find("missing").is_none());
    }
}

//! Load options.

use hdftree_io::ReadMode;

/// Tunables for one tree load, in the style of an HDF5 property list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Maximum number of external or mount hops from the root file.
    pub max_link_depth: usize,
    /// Groups with more members are truncated to their first members.
    pub max_group_members: usize,
    /// Datasets with at most this many elements are read during the walk.
    pub eager_max_elements: usize,
    pub read_mode: ReadMode,
    /// When false only the mount attribute is decoded.
    pub load_attributes: bool,
    pub mount_attribute: String,
    pub mount_scheme: String,
    /// Host identifier recorded on each tree.
    pub host: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_link_depth: 8,
            max_group_members: 100_000,
            eager_max_elements: 1,
            read_mode: ReadMode::default(),
            load_attributes: true,
            mount_attribute: "napimount".to_string(),
            mount_scheme: "nxfile".to_string(),
            host: default_host(),
        }
    }
}

fn default_host() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_link_depth(mut self, depth: usize) -> Self {
        self.max_link_depth = depth;
        self
    }

    pub fn max_group_members(mut self, members: usize) -> Self {
        self.max_group_members = members;
        self
    }

    pub fn eager_max_elements(mut self, elements: usize) -> Self {
        self.eager_max_elements = elements;
        self
    }

    pub fn read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }

    pub fn load_attributes(mut self, load: bool) -> Self {
        self.load_attributes = load;
        self
    }

    pub fn mount(mut self, attribute: &str, scheme: &str) -> Self {
        self.mount_attribute = attribute.to_string();
        self.mount_scheme = scheme.to_string();
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = LoadOptions::default();
        assert_eq!(o.max_link_depth, 8);
        assert_eq!(o.max_group_members, 100_000);
        assert_eq!(o.eager_max_elements, 1);
        assert!(o.load_attributes);
        assert_eq!(o.mount_attribute, "napimount");
        assert_eq!(o.mount_scheme, "nxfile");
        assert!(!o.host.is_empty());
    }

    #[test]
    fn builder_chain() {
        let o = LoadOptions::new()
            .max_link_depth(2)
            .max_group_members(3)
            .read_mode(ReadMode::Buffered)
            .load_attributes(false)
            .host("beamline");
        assert_eq!(o.max_link_depth, 2);
        assert_eq!(o.max_group_members, 3);
        assert_eq!(o.read_mode, ReadMode::Buffered);
        assert!(!o.load_attributes);
        assert_eq!(o.host, "beamline");
    }
}

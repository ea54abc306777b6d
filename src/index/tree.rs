//! Directory tree implied by `/`-separated object names.

use std::collections::{BTreeMap, BTreeSet};

use crate::gs::Object;

/// Listing for one directory: immediate subdirectories and files.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Relative subdirectory names, each ending with `/`.
    pub subdirs: BTreeSet<String>,
    /// Files directly in this directory, sorted by name.
    pub files: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub size: u64,
    pub updated: Option<String>,
}

/// Every directory under a prefix, keyed by its full object-name prefix
/// (the root keeps the prefix itself as its key, subdirectories end with
/// `/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirTree {
    root: String,
    dirs: BTreeMap<String, Listing>,
}

impl DirTree {
    /// Build the tree for `prefix` from a flat object listing.
    ///
    /// The root directory always exists, even for an empty listing.
    /// Zero-length "directory placeholder" names (trailing `/`) mark
    /// directories without adding a file; existing `index.html` objects are
    /// regenerated output, never directory content. Objects outside the
    /// prefix are ignored.
    pub fn build(prefix: &str, objects: &[Object]) -> Self {
        let mut dirs: BTreeMap<String, Listing> = BTreeMap::new();
        dirs.insert(prefix.to_string(), Listing::default());

        for object in objects {
            let Some(rel) = object.name.strip_prefix(prefix) else {
                continue;
            };
            if rel.is_empty() {
                continue;
            }

            let mut parent = prefix.to_string();
            let mut rest = rel;
            while let Some((segment, tail)) = rest.split_once('/') {
                rest = tail;
                if segment.is_empty() {
                    continue;
                }
                let child = format!("{parent}{segment}/");
                dirs.entry(parent)
                    .or_default()
                    .subdirs
                    .insert(format!("{segment}/"));
                dirs.entry(child.clone()).or_default();
                parent = child;
            }

            if rest.is_empty() || rest == "index.html" {
                continue;
            }
            dirs.entry(parent).or_default().files.push(Entry {
                name: rest.to_string(),
                size: object.size,
                updated: object.updated.clone(),
            });
        }

        for listing in dirs.values_mut() {
            listing.files.sort_by(|a, b| a.name.cmp(&b.name));
        }

        DirTree {
            root: prefix.to_string(),
            dirs,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Number of directories, root included.
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Listing)> + '_ {
        self.dirs.iter().map(|(dir, listing)| (dir.as_str(), listing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, size: u64) -> Object {
        Object {
            name: name.to_string(),
            size,
            updated: None,
        }
    }

    #[test]
    fn nested_objects_create_intermediate_directories() {
        let objects = [
            object("p/a/1.0/image.bin", 4096),
            object("p/a/notes.txt", 10),
            object("p/top.txt", 1),
        ];
        let tree = DirTree::build("p/", &objects);

        assert_eq!(tree.len(), 3);
        let dirs: Vec<&str> = tree.iter().map(|(dir, _)| dir).collect();
        assert_eq!(dirs, ["p/", "p/a/", "p/a/1.0/"]);

        let (_, root) = tree.iter().next().unwrap();
        assert!(root.subdirs.contains("a/"));
        assert_eq!(root.files.len(), 1);
        assert_eq!(root.files[0].name, "top.txt");

        let a = tree.iter().find(|(dir, _)| *dir == "p/a/").unwrap().1;
        assert!(a.subdirs.contains("1.0/"));
        assert_eq!(a.files[0].name, "notes.txt");
    }

    #[test]
    fn root_exists_for_empty_listing() {
        let tree = DirTree::build("p/", &[]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), "p/");
        let (_, root) = tree.iter().next().unwrap();
        assert!(root.subdirs.is_empty());
        assert!(root.files.is_empty());
    }

    #[test]
    fn empty_prefix_is_the_bucket_root() {
        let objects = [object("a.txt", 1), object("d/b.txt", 2)];
        let tree = DirTree::build("", &objects);

        let dirs: Vec<&str> = tree.iter().map(|(dir, _)| dir).collect();
        assert_eq!(dirs, ["", "d/"]);
    }

    #[test]
    fn placeholder_objects_mark_directories_without_files() {
        let objects = [object("p/empty/", 0)];
        let tree = DirTree::build("p/", &objects);

        let empty = tree.iter().find(|(dir, _)| *dir == "p/empty/").unwrap().1;
        assert!(empty.files.is_empty());
        let (_, root) = tree.iter().next().unwrap();
        assert!(root.subdirs.contains("empty/"));
    }

    #[test]
    fn existing_index_pages_are_not_content() {
        let objects = [object("p/index.html", 100), object("p/a/index.html", 100)];
        let tree = DirTree::build("p/", &objects);

        for (_, listing) in tree.iter() {
            assert!(listing.files.is_empty());
        }
        // The directory the old page lived in is still known.
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn files_are_sorted_and_sized() {
        let objects = [object("p/b.txt", 2), object("p/a.txt", 1)];
        let tree = DirTree::build("p/", &objects);

        let (_, root) = tree.iter().next().unwrap();
        let names: Vec<&str> = root.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(root.files[0].size, 1);
    }

    #[test]
    fn objects_outside_the_prefix_are_ignored() {
        let objects = [object("other/x.txt", 1), object("p/y.txt", 2)];
        let tree = DirTree::build("p/", &objects);

        assert_eq!(tree.len(), 1);
        let (_, root) = tree.iter().next().unwrap();
        assert_eq!(root.files.len(), 1);
        assert_eq!(root.files[0].name, "y.txt");
    }

    #[test]
    fn doubled_slashes_do_not_create_nameless_directories() {
        let objects = [object("p/a//x.txt", 1)];
        let tree = DirTree::build("p/", &objects);

        let dirs: Vec<&str> = tree.iter().map(|(dir, _)| dir).collect();
        assert_eq!(dirs, ["p/", "p/a/"]);
        let a = tree.iter().find(|(dir, _)| *dir == "p/a/").unwrap().1;
        assert_eq!(a.files[0].name, "x.txt");
    }
}

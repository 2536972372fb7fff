use mdlc_core::{FileTreeStore, ItemId};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    AddFolder { parent: Option<usize> },
    AddFile { parent: Option<usize> },
    Move { item: usize, target: Option<usize> },
    Remove { item: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::option::of(0usize..32).prop_map(|parent| Op::AddFolder { parent }),
        proptest::option::of(0usize..32).prop_map(|parent| Op::AddFile { parent }),
        (0usize..32, proptest::option::of(0usize..32))
            .prop_map(|(item, target)| Op::Move { item, target }),
        (0usize..32).prop_map(|item| Op::Remove { item }),
    ]
}

fn pick(store: &FileTreeStore, index: Option<usize>) -> Option<ItemId> {
    let index = index?;
    let items = store.items();
    if items.is_empty() {
        return None;
    }
    Some(items[index % items.len()].id)
}

fn assert_tree_is_acyclic(store: &FileTreeStore) {
    for item in store.items() {
        let mut seen = HashSet::new();
        let mut cursor = Some(item.id);
        while let Some(id) = cursor {
            assert!(seen.insert(id), "cycle through {id}");
            let current = store.get(id).expect("parent chain stays inside the tree");
            cursor = current.parent_id;
        }
        assert!(store.file_path(item).is_ok());
    }
}

proptest! {
    #[test]
    fn random_edits_never_break_the_hierarchy(ops in proptest::collection::vec(op_strategy(), 1..60)) {
        let mut store = FileTreeStore::in_memory();
        for op in ops {
            match op {
                Op::AddFolder { parent } => {
                    let parent = pick(&store, parent);
                    store.add_folder("folder", parent).unwrap();
                }
                Op::AddFile { parent } => {
                    let parent = pick(&store, parent);
                    store.add_file("file.md", "", parent).unwrap();
                }
                Op::Move { item, target } => {
                    if let Some(item) = pick(&store, Some(item)) {
                        let target = pick(&store, target);
                        store.move_item(item, target).unwrap();
                    }
                }
                Op::Remove { item } => {
                    if let Some(item) = pick(&store, Some(item)) {
                        store.remove_item(item).unwrap();
                    }
                }
            }

            assert_tree_is_acyclic(&store);
            for item in store.items() {
                if let Some(parent) = item.parent_id {
                    prop_assert!(store.get(parent).is_some_and(|parent| parent.is_folder()));
                }
            }
        }
    }
}

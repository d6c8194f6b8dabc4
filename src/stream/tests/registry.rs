//! Registry, alias and enumeration tests

use std::sync::Arc;

use proptest::prelude::*;

use super::test_registry;
use crate::stream::encoding::Encoding;
use crate::stream::registry::SourceLocation;
use crate::stream::{Atom, Stream};

fn names(atoms: Vec<Atom>) -> Vec<String> {
    atoms.into_iter().map(|a| a.to_string()).collect()
}

#[cfg(test)]
mod alias_tests {
    use super::*;

    #[test]
    fn test_rebind_moves_alias() {
        let registry = test_registry();
        let one = registry.open_memory_input("1", Encoding::Utf8);
        let two = registry.open_memory_input("2", Encoding::Utf8);
        registry.bind_alias(&one, "a");
        registry.bind_alias(&two, "b");

        registry.bind_alias(&two, "a");

        assert!(registry.aliases(&one).is_empty());
        assert_eq!(names(registry.aliases(&two)), vec!["b", "a"]);
        assert!(Arc::ptr_eq(&registry.lookup_alias("a").unwrap(), &two));
        assert!(Arc::ptr_eq(&registry.lookup_alias("b").unwrap(), &two));
        assert_eq!(registry.first_alias(&two).unwrap().as_str(), "b");
    }

    #[test]
    fn test_rebind_same_stream_is_noop() {
        let registry = test_registry();
        let s = registry.open_memory_input("", Encoding::Utf8);
        registry.bind_alias(&s, "x");
        registry.bind_alias(&s, "x");
        assert_eq!(names(registry.aliases(&s)), vec!["x"]);
    }

    #[test]
    fn test_unbind() {
        let registry = test_registry();
        let s = registry.open_memory_input("", Encoding::Utf8);
        registry.bind_alias(&s, "x");
        registry.bind_alias(&s, "y");
        registry.bind_alias(&s, "z");

        registry.unbind_alias(&s, Some("y"));
        assert_eq!(names(registry.aliases(&s)), vec!["x", "z"]);
        assert!(registry.lookup_alias("y").is_none());

        registry.unbind_alias(&s, None);
        assert!(registry.aliases(&s).is_empty());
        assert!(registry.lookup_alias("x").is_none());
    }

    #[test]
    fn test_close_drops_aliases() {
        let registry = test_registry();
        let s = registry.open_memory_input("", Encoding::Utf8);
        registry.bind_alias(&s, "gone");
        registry.close_stream(&s, false).unwrap();
        assert!(registry.lookup_alias("gone").is_none());
        assert!(registry.get(s.id()).is_none());
    }

    #[test]
    fn test_closed_stream_takes_no_names() {
        let registry = test_registry();
        let live = registry.open_memory_input("", Encoding::Utf8);
        registry.bind_alias(&live, "keep");
        let s = registry.open_memory_input("", Encoding::Utf8);
        registry.close_stream(&s, false).unwrap();

        registry.bind_alias(&s, "late");
        registry.bind_alias(&s, "keep");
        registry.set_filename(&s, Some("late.pl"));

        assert!(registry.lookup_alias("late").is_none());
        assert_eq!(registry.lookup_alias("keep").map(|t| t.id()), Some(live.id()));
        assert!(registry.aliases(&s).is_empty());
        assert!(registry.filename(&s).is_none());
    }

    #[test]
    fn test_describe_prefers_alias() {
        let registry = test_registry();
        let s = registry.open_memory_input("", Encoding::Utf8);
        assert_eq!(registry.describe(&s), format!("<stream>(#{})", s.id()));
        registry.bind_alias(&s, "named");
        assert_eq!(registry.describe(&s), "named");
    }
}

#[cfg(test)]
mod alias_props {
    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        Bind(usize, usize),
        Unbind(usize, usize),
        UnbindAll(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0usize..4).prop_map(|(s, a)| Op::Bind(s, a)),
            (0usize..3, 0usize..4).prop_map(|(s, a)| Op::Unbind(s, a)),
            (0usize..3).prop_map(Op::UnbindAll),
        ]
    }

    const ALIASES: [&str; 4] = ["a", "b", "c", "d"];

    proptest! {
        #[test]
        fn prop_alias_has_single_owner(ops in proptest::collection::vec(op_strategy(), 0..40)) {
            let registry = test_registry();
            let streams: Vec<Arc<Stream>> = (0..3)
                .map(|_| registry.open_memory_input("", Encoding::Utf8))
                .collect();

            for op in ops {
                match op {
                    Op::Bind(s, a) => registry.bind_alias(&streams[s], ALIASES[a]),
                    Op::Unbind(s, a) => registry.unbind_alias(&streams[s], Some(ALIASES[a])),
                    Op::UnbindAll(s) => registry.unbind_alias(&streams[s], None),
                }

                for alias in ALIASES {
                    let owners: Vec<usize> = streams
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| registry.aliases(s).iter().any(|a| a.as_str() == alias))
                        .map(|(i, _)| i)
                        .collect();
                    prop_assert!(owners.len() <= 1);
                    match registry.lookup_alias(alias) {
                        Some(found) => {
                            prop_assert_eq!(owners.len(), 1);
                            prop_assert!(Arc::ptr_eq(&found, &streams[owners[0]]));
                        }
                        None => prop_assert!(owners.is_empty()),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod table_tests {
    use super::*;

    #[test]
    fn test_standard_streams_registered() {
        let registry = test_registry();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.std_input().id(), 0);
        assert_eq!(registry.std_output().id(), 1);
        assert_eq!(registry.std_error().id(), 2);
        assert!(registry.std_input().is_input());
        assert!(registry.std_error().is_output());
    }

    #[test]
    fn test_enumerate_is_a_snapshot() {
        let registry = test_registry();
        let a = registry.open_memory_input("", Encoding::Utf8);
        let snapshot: Vec<_> = registry.enumerate().collect();
        let b = registry.open_memory_input("", Encoding::Utf8);
        registry.close_stream(&a, false).unwrap();

        let ids: Vec<u64> = snapshot.iter().map(|(s, _)| s.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, a.id()]);
        let now: Vec<u64> = registry.enumerate().map(|(s, _)| s.id()).collect();
        assert_eq!(now, vec![0, 1, 2, b.id()]);
    }

    #[test]
    fn test_find_stream_from_file() {
        let registry = test_registry();
        let first = registry.open_memory_input("", Encoding::Utf8);
        let second = registry.open_memory_input("", Encoding::Utf8);
        for s in [&first, &second] {
            registry.set_filename(s, Some("data.txt"));
        }
        assert!(registry.find_stream_from_file("data.txt", true, false).is_none());

        registry.mark_opened_by(&second, true, false);
        registry.mark_opened_by(&first, true, false);
        let found = registry.find_stream_from_file("data.txt", true, false).unwrap();
        assert!(Arc::ptr_eq(&found, &first));
        assert!(registry.find_stream_from_file("data.txt", false, true).is_none());
    }

    #[test]
    fn test_closing_loading_file_clears_source() {
        let registry = test_registry();
        let s = registry.open_memory_input("", Encoding::Utf8);
        registry.set_filename(&s, Some("boot.pl"));
        registry.set_source_location(Some(SourceLocation {
            file: Atom::new("boot.pl"),
            line: 12,
        }));
        registry.close_stream(&s, false).unwrap();
        assert!(registry.source_location().is_none());
    }
}

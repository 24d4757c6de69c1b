use std::collections::HashSet;

use crate::models::{NewProducts, Snapshot};

/// Records in `current` whose id is absent from the same site in `previous`.
///
/// Identity is the id alone, so a price or name change is not news. Sites
/// are compared independently and sites without new records are left out.
pub fn new_products(current: &Snapshot, previous: &Snapshot) -> NewProducts {
    current
        .iter()
        .filter_map(|(site, products)| {
            let known: HashSet<&str> = previous
                .get(site)
                .unwrap_or_default()
                .iter()
                .map(|p| p.id.as_str())
                .collect();

            let fresh: Vec<_> = products
                .iter()
                .filter(|p| !known.contains(p.id.as_str()))
                .cloned()
                .collect();

            (!fresh.is_empty()).then(|| (site.to_string(), fresh))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::product;
    use crate::models::Product;

    fn snapshot(entries: &[(&str, &[Product])]) -> Snapshot {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn test_added_record_is_new() {
        let p1 = product("a", "a_1", "YAMAHA CG142S");
        let p2 = product("a", "a_2", "YAMAHA GC22");

        let previous = snapshot(&[("a", &[p1.clone()])]);
        let current = snapshot(&[("a", &[p1.clone(), p2.clone()])]);

        let diff = new_products(&current, &previous);
        assert_eq!(diff, snapshot(&[("a", &[p2])]));
    }

    #[test]
    fn test_unchanged_site_omitted() {
        let p1 = product("a", "a_1", "YAMAHA CG142S");
        let previous = snapshot(&[("a", &[p1.clone()])]);
        let current = snapshot(&[("a", &[p1])]);

        let diff = new_products(&current, &previous);
        assert!(diff.is_empty());
        assert!(diff.get("a").is_none());
    }

    #[test]
    fn test_first_run_everything_is_new() {
        let a = [product("a", "a_1", "YAMAHA CG142S"), product("a", "a_2", "ARIA A-20")];
        let b = [product("b", "b_1", "Cordoba C10")];
        let current = snapshot(&[("a", &a), ("b", &b), ("c", &[])]);

        let diff = new_products(&current, &Snapshot::new());
        assert_eq!(diff, snapshot(&[("a", &a), ("b", &b)]));
    }

    #[test]
    fn test_order_follows_current() {
        let p1 = product("a", "a_1", "one");
        let p2 = product("a", "a_2", "two");
        let p3 = product("a", "a_3", "three");
        let p4 = product("a", "a_4", "four");

        let previous = snapshot(&[("a", &[p2.clone()])]);
        let current = snapshot(&[("a", &[p4.clone(), p2, p1.clone(), p3.clone()])]);

        let diff = new_products(&current, &previous);
        let ids: Vec<&str> = diff.get("a").unwrap().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a_4", "a_1", "a_3"]);
    }

    #[test]
    fn test_changed_fields_with_same_id_not_new() {
        let before = product("a", "a_1", "YAMAHA CG142S");
        let after = Product {
            price: "¥29,800".into(),
            name: "YAMAHA CG142S (値下げ)".into(),
            ..before.clone()
        };

        let diff = new_products(&snapshot(&[("a", &[after])]), &snapshot(&[("a", &[before])]));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_no_cross_site_matching() {
        let shared = product("a", "same", "Ramirez 1a");
        let previous = snapshot(&[("a", &[shared.clone()])]);
        let current = snapshot(&[("a", &[shared.clone()]), ("b", &[shared.clone()])]);

        let diff = new_products(&current, &previous);
        assert_eq!(diff, snapshot(&[("b", &[shared])]));
    }
}

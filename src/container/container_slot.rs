use std::fmt;

/// One named slot of an aggregation container chain.
///
/// The chain is a singly linked list: the first slot is the outermost one and
/// `next` points at the nested remainder. `T` is `Expression` while binding and
/// `Value` once the chain is materialized by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSlot<T> {
    pub name: String,
    pub value: T,
    pub next: Option<Box<ContainerSlot<T>>>,
}

impl<T> ContainerSlot<T> {
    pub fn new(name: &str, value: T) -> Self {
        Self { name: name.to_string(), value, next: None }
    }

    /// Build a chain whose outermost slot is the first pair; `None` when empty.
    pub fn from_pairs<I>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (String, T)>,
        I::IntoIter: DoubleEndedIterator,
    {
        pairs.into_iter().rev().fold(None, |next, (name, value)| {
            Some(ContainerSlot { name, value, next: next.map(Box::new) })
        })
    }

    pub fn iter(&self) -> SlotIter<'_, T> {
        SlotIter { current: Some(self) }
    }

    /// Number of slots; a chain always has at least one.
    pub fn slot_count(&self) -> usize {
        self.iter().count()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|slot| slot.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.iter().find(|slot| slot.name == name).map(|slot| &slot.value)
    }

    /// Rebuild the chain with every value mapped, keeping names and order.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<ContainerSlot<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        let value = f(&self.value)?;
        let rest = self
            .iter()
            .skip(1)
            .map(|slot| Ok((slot.name.clone(), f(&slot.value)?)))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(ContainerSlot {
            name: self.name.clone(),
            value,
            next: ContainerSlot::from_pairs(rest).map(Box::new),
        })
    }
}

pub struct SlotIter<'a, T> {
    current: Option<&'a ContainerSlot<T>>,
}

impl<'a, T> Iterator for SlotIter<'a, T> {
    type Item = &'a ContainerSlot<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.current?;
        self.current = slot.next.as_deref();
        Some(slot)
    }
}

impl<T: fmt::Display> fmt::Display for ContainerSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, slot) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", slot.name, slot.value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn chain_keeps_declaration_order() {
        let chain = ContainerSlot::from_pairs(vec![("A".to_string(), 1), ("B".to_string(), 2)]).unwrap();
        assert_eq!(chain.names(), vec!["A", "B"]);
        assert_eq!(chain.name, "A");
        assert_eq!(chain.next.as_ref().unwrap().name, "B");
        assert_eq!(chain.get("B"), Some(&2));
        assert_eq!(chain.get("C"), None);
        assert_eq!(chain.to_string(), "{A = 1, B = 2}");
        assert!(ContainerSlot::<i32>::from_pairs(Vec::new()).is_none());
    }

    proptest! {
        #[test]
        fn try_map_preserves_shape(values in proptest::collection::vec(any::<i32>(), 1..16)) {
            let pairs: Vec<_> = values.iter().enumerate().map(|(i, v)| (format!("Property{i}"), *v)).collect();
            let chain = ContainerSlot::from_pairs(pairs.clone()).unwrap();
            let mapped = chain.try_map(|v| Ok::<_, ()>(i64::from(*v) * 2)).unwrap();
            prop_assert_eq!(mapped.slot_count(), values.len());
            prop_assert_eq!(mapped.names(), chain.names());
            for (name, v) in pairs {
                prop_assert_eq!(mapped.get(&name), Some(&(i64::from(v) * 2)));
            }
        }
    }
}

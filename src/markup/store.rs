use crate::markup::model::{Annotation, AnnotationId, Markup};
use chrono::Utc;

/// Committed annotations for one session, in insertion order.
///
/// Append-only: the only removal is [`AnnotationStore::clear`]. Every
/// mutation bumps `revision`, which render caches key on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    next_id: u64,
    revision: u64,
}

impl AnnotationStore {
    pub fn commit(&mut self, markup: Markup) -> &Annotation {
        self.next_id += 1;
        self.revision += 1;
        self.annotations.push(Annotation {
            id: AnnotationId(self.next_id),
            markup,
            created_at: Utc::now(),
        });
        &self.annotations[self.annotations.len() - 1]
    }

    pub fn clear(&mut self) {
        if self.annotations.is_empty() {
            return;
        }
        self.annotations.clear();
        self.revision += 1;
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::model::{Color, Point, Shape};

    fn line(offset: f64) -> Markup {
        Markup {
            shape: Shape::Line {
                start: Point::new(offset, offset),
                end: Point::new(offset + 1.0, offset + 1.0),
            },
            color: Color::RED,
            stroke_width: 2,
        }
    }

    #[test]
    fn commit_preserves_insertion_order_and_assigns_increasing_ids() {
        let mut store = AnnotationStore::default();
        store.commit(line(0.0));
        store.commit(line(5.0));
        store.commit(line(9.0));

        let ids: Vec<u64> = store.iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.annotations()[1].markup, line(5.0));
        assert_eq!(store.revision(), 3);
    }

    #[test]
    fn clear_empties_store_and_bumps_revision_once() {
        let mut store = AnnotationStore::default();
        store.commit(line(0.0));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.revision(), 2);

        store.clear();
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn ids_keep_increasing_after_clear() {
        let mut store = AnnotationStore::default();
        store.commit(line(0.0));
        store.clear();
        let id = store.commit(line(1.0)).id;
        assert_eq!(id, AnnotationId(2));
    }
}

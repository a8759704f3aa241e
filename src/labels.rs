use crate::voc_labels::VOC_LABELS;

/// Maps a subset of the VOC class names to a compact, contiguous set of
/// model ids.
///
/// Training usually targets a handful of the 20 VOC classes. Keeping the
/// model's class space dense (1..=n, with 0 reserved for background) keeps
/// the classifier head small and lets cross-entropy index class logits
/// directly instead of working over a sparse one-hot space.
#[derive(Clone)]
pub struct ClassMap {
    voc_ids: Vec<usize>,
}

impl ClassMap {
    /// Builds a mapping from a list of VOC class names. Names that are not
    /// VOC classes are ignored.
    pub fn new(names: Vec<&str>) -> Self {
        let mut voc_ids = vec![];

        for name in names.iter() {
            if let Some(i) = VOC_LABELS.iter().position(|label| label == name) {
                voc_ids.push(i);
            }
        }

        ClassMap { voc_ids }
    }

    /// Total number of model classes, background included.
    pub fn count(&self) -> usize {
        self.voc_ids.len() + 1
    }

    /// Maps a VOC class name to its model id (1-based; 0 is background).
    pub fn model_id(&self, name: &str) -> Option<usize> {
        let voc_id = VOC_LABELS.iter().position(|label| *label == name)?;

        self.voc_ids.iter().position(|id| *id == voc_id).map(|i| i + 1)
    }

    /// Maps a model id back to its VOC class name.
    pub fn name(&self, model_id: usize) -> &'static str {
        if model_id == 0 {
            return "background";
        }

        VOC_LABELS[self.voc_ids[model_id - 1]]
    }

    /// Class names ordered by model id, background excluded.
    pub fn names(&self) -> Vec<String> {
        (1..self.count()).map(|id| self.name(id).into()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaps_subset_to_contiguous_ids() {
        let names = vec!["chair", "bottle", "sofa", "tvmonitor", "diningtable"];
        let map = ClassMap::new(names.clone());

        assert_eq!(map.count(), 6);

        assert_eq!(map.model_id("chair").unwrap(), 1);
        assert_eq!(map.model_id("bottle").unwrap(), 2);
        assert_eq!(map.model_id("sofa").unwrap(), 3);
        assert_eq!(map.model_id("tvmonitor").unwrap(), 4);
        assert_eq!(map.model_id("diningtable").unwrap(), 5);

        // present in VOC but not in this training run
        assert_eq!(map.model_id("cat"), None);
        // not a VOC class at all
        assert_eq!(map.model_id("giraffe"), None);

        assert_eq!(map.name(0), "background");
        assert_eq!(map.name(1), "chair");
        assert_eq!(map.name(5), "diningtable");

        let expected: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        assert_eq!(map.names(), expected);
    }

    #[test]
    fn unknown_names_are_dropped_at_construction() {
        let map = ClassMap::new(vec!["person", "unicorn", "dog"]);

        assert_eq!(map.count(), 3);
        assert_eq!(map.model_id("person").unwrap(), 1);
        assert_eq!(map.model_id("dog").unwrap(), 2);
    }
}

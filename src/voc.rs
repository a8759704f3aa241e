use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use roxmltree::{Document, Node};

use crate::{error::DatasetError, labels::ClassMap};

/// Ground truth for one image, parsed once from its VOC XML annotation and
/// immutable afterwards.
///
/// Boxes are kept in pixel corner coordinates (x1, y1, x2, y2); they are
/// normalized against the actual decoded image inside the transform
/// pipeline. Labels are model ids from the [`ClassMap`], never 0.
#[derive(Clone, Debug)]
pub struct Annotation {
    /// Image file name relative to `JPEGImages/`, e.g. `000005.jpg`.
    pub key: String,
    pub boxes: Vec<[f32; 4]>,
    pub labels: Vec<i64>,
}

/// One training sample handed to the batcher: the decoded image plus its
/// ground truth.
#[derive(Clone, Debug)]
pub struct VocSample {
    pub image: image::RgbImage,
    pub boxes: Vec<[f32; 4]>,
    pub labels: Vec<i64>,
    pub key: String,
}

fn child_text<'a>(
    node: Node<'a, 'a>,
    element: &'static str,
    path: &Path,
) -> Result<&'a str, DatasetError> {
    node.children()
        .find(|c| c.has_tag_name(element))
        .and_then(|c| c.text())
        .ok_or_else(|| DatasetError::MissingElement {
            path: path.to_path_buf(),
            element,
        })
}

fn child_f32(node: Node, element: &'static str, path: &Path) -> Result<f32, DatasetError> {
    let value = child_text(node, element, path)?.trim();

    value.parse::<f32>().map_err(|_| DatasetError::BadNumber {
        path: path.to_path_buf(),
        element,
        value: value.into(),
    })
}

/// Parses a single VOC XML annotation.
///
/// Objects whose class name is not covered by the [`ClassMap`] are dropped,
/// which is how training on a subset of the VOC classes works: the rest of
/// the pipeline never sees the other objects. The annotation may come back
/// with no boxes at all; [`VocDataset::from_dir`] filters those out.
pub fn parse_annotation(
    text: &str,
    path: &Path,
    class_map: &ClassMap,
) -> Result<Annotation, DatasetError> {
    let doc = Document::parse(text).map_err(|source| DatasetError::Xml {
        path: path.to_path_buf(),
        source,
    })?;

    let root = doc.root_element();
    let key = child_text(root, "filename", path)?.trim().to_string();

    let mut boxes = vec![];
    let mut labels = vec![];

    for object in root.children().filter(|n| n.has_tag_name("object")) {
        let name = child_text(object, "name", path)?.trim();

        let Some(model_id) = class_map.model_id(name) else {
            continue;
        };

        let bndbox = object
            .children()
            .find(|c| c.has_tag_name("bndbox"))
            .ok_or_else(|| DatasetError::MissingElement {
                path: path.to_path_buf(),
                element: "bndbox",
            })?;

        boxes.push([
            child_f32(bndbox, "xmin", path)?,
            child_f32(bndbox, "ymin", path)?,
            child_f32(bndbox, "xmax", path)?,
            child_f32(bndbox, "ymax", path)?,
        ]);
        labels.push(model_id as i64);
    }

    Ok(Annotation { key, boxes, labels })
}

/// A VOC-layout detection dataset: `Annotations/*.xml` describing images in
/// `JPEGImages/`.
///
/// All annotations are parsed up front; images are decoded lazily per item
/// so the working set stays small and the dataloader's workers do the IO.
#[derive(Debug)]
pub struct VocDataset {
    image_dir: PathBuf,
    annotations: Vec<Annotation>,
}

impl VocDataset {
    /// Scans `<root>/Annotations` and parses every XML file found there.
    ///
    /// Images whose annotation contains no object covered by the class map
    /// contribute nothing to the multibox loss and are skipped entirely.
    pub fn from_dir(root: &Path, class_map: &ClassMap) -> Result<Self, DatasetError> {
        let ann_dir = root.join("Annotations");
        let image_dir = root.join("JPEGImages");

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&ann_dir)
            .map_err(|source| DatasetError::Io {
                path: ann_dir.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "xml"))
            .collect();

        // Directory order is filesystem dependent; sort so the dataset (and
        // any seeded split of it) is reproducible.
        paths.sort();

        let mut annotations = vec![];

        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|source| DatasetError::Io {
                path: path.clone(),
                source,
            })?;

            let annotation = parse_annotation(&text, &path, class_map)?;

            if !annotation.labels.is_empty() {
                annotations.push(annotation);
            }
        }

        if annotations.is_empty() {
            return Err(DatasetError::EmptyDataset { path: ann_dir });
        }

        Ok(VocDataset {
            image_dir,
            annotations,
        })
    }

    /// Splits into (train, validation) datasets after a seeded shuffle.
    pub fn split(self, training_ratio: f32, seed: u64) -> (VocDataset, VocDataset) {
        let mut annotations = self.annotations;
        let mut rng = StdRng::seed_from_u64(seed);
        annotations.shuffle(&mut rng);

        let pivot = (annotations.len() as f32 * training_ratio).round() as usize;
        let validation = annotations.split_off(pivot.min(annotations.len()));

        (
            VocDataset {
                image_dir: self.image_dir.clone(),
                annotations,
            },
            VocDataset {
                image_dir: self.image_dir,
                annotations: validation,
            },
        )
    }

    pub fn keys(&self) -> Vec<&str> {
        self.annotations.iter().map(|a| a.key.as_str()).collect()
    }
}

impl Dataset<VocSample> for VocDataset {
    fn get(&self, index: usize) -> Option<VocSample> {
        let annotation = self.annotations.get(index)?;
        let path = self.image_dir.join(&annotation.key);

        let image = image::open(&path)
            .unwrap_or_else(|e| panic!("couldn't decode {}: {e}", path.display()))
            .to_rgb8();

        Some(VocSample {
            image,
            boxes: annotation.boxes.clone(),
            labels: annotation.labels.clone(),
            key: annotation.key.clone(),
        })
    }

    fn len(&self) -> usize {
        self.annotations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"
<annotation>
    <folder>VOC2007</folder>
    <filename>000005.jpg</filename>
    <size><width>500</width><height>375</height><depth>3</depth></size>
    <object>
        <name>chair</name>
        <difficult>0</difficult>
        <bndbox><xmin>263</xmin><ymin>211</ymin><xmax>324</xmax><ymax>339</ymax></bndbox>
    </object>
    <object>
        <name>dog</name>
        <difficult>0</difficult>
        <bndbox><xmin>5</xmin><ymin>10</ymin><xmax>100</xmax><ymax>200</ymax></bndbox>
    </object>
</annotation>"#;

    fn chair_map() -> ClassMap {
        ClassMap::new(vec!["chair", "bottle"])
    }

    #[test]
    fn parses_boxes_and_filters_unmapped_classes() {
        let annotation =
            parse_annotation(XML, Path::new("000005.xml"), &chair_map()).unwrap();

        assert_eq!(annotation.key, "000005.jpg");
        // the dog is not in the class map and is dropped
        assert_eq!(annotation.boxes, vec![[263.0, 211.0, 324.0, 339.0]]);
        assert_eq!(annotation.labels, vec![1]);
    }

    #[test]
    fn missing_bndbox_is_an_error() {
        let xml = r#"
<annotation>
    <filename>x.jpg</filename>
    <object><name>chair</name></object>
</annotation>"#;

        let err = parse_annotation(xml, Path::new("x.xml"), &chair_map()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingElement { element: "bndbox", .. }));
    }

    #[test]
    fn non_numeric_coordinate_is_an_error() {
        let xml = r#"
<annotation>
    <filename>x.jpg</filename>
    <object>
        <name>chair</name>
        <bndbox><xmin>abc</xmin><ymin>1</ymin><xmax>2</xmax><ymax>2</ymax></bndbox>
    </object>
</annotation>"#;

        let err = parse_annotation(xml, Path::new("x.xml"), &chair_map()).unwrap_err();
        assert!(matches!(err, DatasetError::BadNumber { element: "xmin", .. }));
    }

    fn write_voc_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = std::env::temp_dir().join(format!("voc-ssd-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("Annotations")).unwrap();
        std::fs::create_dir_all(root.join("JPEGImages")).unwrap();

        for (file, contents) in files {
            std::fs::write(root.join("Annotations").join(file), contents).unwrap();
        }

        root
    }

    #[test]
    fn from_dir_drops_images_without_mapped_objects() {
        let dog_only = r#"
<annotation>
    <filename>000007.jpg</filename>
    <object>
        <name>dog</name>
        <bndbox><xmin>1</xmin><ymin>1</ymin><xmax>2</xmax><ymax>2</ymax></bndbox>
    </object>
</annotation>"#;

        let root = write_voc_dir("filter", &[("000005.xml", XML), ("000007.xml", dog_only)]);

        let dataset = VocDataset::from_dir(&root, &chair_map()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.keys(), vec!["000005.jpg"]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn from_dir_with_nothing_usable_is_an_error() {
        let root = write_voc_dir("empty", &[]);

        let err = VocDataset::from_dir(&root, &chair_map()).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyDataset { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn split_is_seeded_and_exhaustive() {
        let annotations: Vec<Annotation> = (0..10)
            .map(|i| Annotation {
                key: format!("{i:06}.jpg"),
                boxes: vec![[0.0, 0.0, 1.0, 1.0]],
                labels: vec![1],
            })
            .collect();

        let dataset = VocDataset {
            image_dir: PathBuf::from("JPEGImages"),
            annotations: annotations.clone(),
        };

        let (train, valid) = dataset.split(0.8, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(valid.len(), 2);

        let mut all: Vec<String> = train
            .keys()
            .into_iter()
            .chain(valid.keys())
            .map(|k| k.to_string())
            .collect();
        all.sort();
        let mut expected: Vec<String> = annotations.iter().map(|a| a.key.clone()).collect();
        expected.sort();
        assert_eq!(all, expected);

        // same seed, same split
        let dataset = VocDataset {
            image_dir: PathBuf::from("JPEGImages"),
            annotations,
        };
        let (train2, _) = dataset.split(0.8, 42);
        assert_eq!(train.keys(), train2.keys());
    }
}

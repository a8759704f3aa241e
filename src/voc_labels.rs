/// The 20 PASCAL VOC object classes, in the dataset's canonical order.
///
/// Index 0 here is the first real class; the model reserves class id 0 for
/// background, so model ids are offset by one (see `labels::ClassMap`).
pub const VOC_LABELS: [&str; 20] = [
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

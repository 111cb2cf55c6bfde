use crate::distance::Feature;
use crate::utils::bbox::BoundingBox;
use serde::{Deserialize, Serialize};

/// Object classes the pipeline cares about, with their COCO class ids.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Person,
    Phone,
    Laptop,
    Book,
}

impl ObjectClass {
    pub fn from_coco_id(class_id: i64) -> Option<ObjectClass> {
        match class_id {
            0 => Some(ObjectClass::Person),
            67 => Some(ObjectClass::Phone),
            63 => Some(ObjectClass::Laptop),
            73 => Some(ObjectClass::Book),
            _ => None,
        }
    }

    pub fn coco_id(&self) -> i64 {
        match self {
            ObjectClass::Person => 0,
            ObjectClass::Phone => 67,
            ObjectClass::Laptop => 63,
            ObjectClass::Book => 73,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Person => "person",
            ObjectClass::Phone => "phone",
            ObjectClass::Laptop => "laptop",
            ObjectClass::Book => "book",
        }
    }
}

/// A single detector output.
///
#[derive(Clone, Debug)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub class: ObjectClass,
    /// Optional appearance embedding attached by the detector.
    pub feature: Option<Feature>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, score: f32, class: ObjectClass) -> Self {
        assert!(
            (0.0..=1.0).contains(&score),
            "Score must lay between 0.0 and 1.0"
        );
        Self {
            bbox,
            score,
            class,
            feature: None,
        }
    }
}

/// Detector output split into persons and the remaining relevant objects.
///
#[derive(Clone, Debug, Default)]
pub struct Detections {
    pub persons: Vec<Detection>,
    pub objects: Vec<Detection>,
}

/// A detected face with its optional landmarks and embedding.
///
#[derive(Clone, Debug)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub landmarks: Option<Vec<(f32, f32)>>,
    pub feature: Option<Feature>,
}

/// Associates every phone detection with exactly one person.
///
/// The person whose bbox contains the phone's center wins; otherwise the person with the
/// minimum distance between bbox centers. Ties resolve to the lowest person index.
///
/// # Parameters
/// * `persons` - person detections of the current frame
/// * `objects` - object detections of the current frame; non-phones are ignored
///
pub fn phones_near_persons<'a>(
    persons: &[Detection],
    objects: &'a [Detection],
) -> Vec<(usize, &'a Detection)> {
    let mut associations = Vec::new();

    for phone in objects.iter().filter(|o| o.class == ObjectClass::Phone) {
        let (cx, cy) = phone.bbox.center();

        let mut nearest: Option<usize> = None;
        let mut min_dist = f32::INFINITY;

        for (i, person) in persons.iter().enumerate() {
            if person.bbox.contains_point(cx, cy) {
                nearest = Some(i);
                break;
            }

            let dist = BoundingBox::center_distance(&phone.bbox, &person.bbox);
            if dist < min_dist {
                min_dist = dist;
                nearest = Some(i);
            }
        }

        if let Some(idx) = nearest {
            associations.push((idx, phone));
        }
    }

    associations
}

#[cfg(test)]
mod tests {
    use crate::detection::{phones_near_persons, Detection, ObjectClass};
    use crate::utils::bbox::BoundingBox;

    fn person(left: f32, top: f32, right: f32, bottom: f32) -> Detection {
        Detection::new(
            BoundingBox::new(left, top, right, bottom),
            0.9,
            ObjectClass::Person,
        )
    }

    fn phone(left: f32, top: f32, right: f32, bottom: f32) -> Detection {
        Detection::new(
            BoundingBox::new(left, top, right, bottom),
            0.8,
            ObjectClass::Phone,
        )
    }

    #[test]
    fn class_table() {
        assert_eq!(ObjectClass::from_coco_id(0), Some(ObjectClass::Person));
        assert_eq!(ObjectClass::from_coco_id(67), Some(ObjectClass::Phone));
        assert_eq!(ObjectClass::from_coco_id(63), Some(ObjectClass::Laptop));
        assert_eq!(ObjectClass::from_coco_id(73), Some(ObjectClass::Book));
        assert_eq!(ObjectClass::from_coco_id(5), None);
        assert_eq!(ObjectClass::Phone.as_str(), "phone");
        assert_eq!(ObjectClass::Phone.coco_id(), 67);
    }

    #[test]
    fn containment_beats_distance() {
        // The phone center sits inside the second person, while the first person's
        // center is closer.
        let persons = vec![person(0.0, 0.0, 20.0, 20.0), person(25.0, 0.0, 100.0, 100.0)];
        let phones = vec![phone(26.0, 1.0, 30.0, 5.0)];

        let assoc = phones_near_persons(&persons, &phones);
        assert_eq!(assoc.len(), 1);
        assert_eq!(assoc[0].0, 1);
    }

    #[test]
    fn nearest_center_fallback() {
        let persons = vec![person(0.0, 0.0, 10.0, 10.0), person(100.0, 0.0, 110.0, 10.0)];
        let phones = vec![phone(80.0, 20.0, 84.0, 24.0)];

        let assoc = phones_near_persons(&persons, &phones);
        assert_eq!(assoc[0].0, 1);
    }

    #[test]
    fn equidistant_tie_prefers_lower_index() {
        let persons = vec![person(0.0, 0.0, 10.0, 10.0), person(20.0, 0.0, 30.0, 10.0)];
        // Phone center at (15, 5): equidistant from both person centers.
        let phones = vec![phone(14.0, 4.0, 16.0, 6.0)];

        let assoc = phones_near_persons(&persons, &phones);
        assert_eq!(assoc[0].0, 0);
    }

    #[test]
    fn each_phone_gets_one_person() {
        let persons = vec![person(0.0, 0.0, 50.0, 50.0)];
        let phones = vec![phone(10.0, 10.0, 14.0, 14.0), phone(30.0, 30.0, 34.0, 34.0)];

        let assoc = phones_near_persons(&persons, &phones);
        assert_eq!(assoc.len(), 2);
        assert!(assoc.iter().all(|(idx, _)| *idx == 0));
    }

    #[test]
    fn no_persons_no_associations() {
        let phones = vec![phone(10.0, 10.0, 14.0, 14.0)];
        assert!(phones_near_persons(&[], &phones).is_empty());
    }
}

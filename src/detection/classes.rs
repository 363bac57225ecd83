//! Class vocabulary: model labels, the shop's target subset, display names
//! and tool categories.

use serde::Serialize;

/// Labels of the 80-class COCO model, indexed by class id.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Classes reported to clients; everything else is dropped after NMS.
pub const TARGET_CLASSES: [&str; 7] = [
    "scissors",
    "knife",
    "bottle",
    "cup",
    "bowl",
    "remote",
    "cell phone",
];

const TOOL_CATEGORIES: [(&str, &[&str]); 2] = [
    ("cutting_tools", &["scissors", "knife"]),
    ("hand_tools", &["remote", "cell phone"]),
];

// (class, display name, description)
const VOCABULARY: [(&str, &str, &str); 7] = [
    ("scissors", "Tesoura", "Scissors - cutting tool"),
    ("knife", "Faca", "Knife - sharp cutting tool"),
    ("bottle", "Garrafa", "Bottle - container for fluids"),
    ("cup", "Copo", "Cup - container for fluids or small parts"),
    ("bowl", "Tigela", "Bowl - tray for sorting components"),
    ("remote", "Controle Remoto", "Remote - electronic control device"),
    (
        "cell phone",
        "Celular",
        "Cell phone - usable for measurements or lookups",
    ),
];

/// Label for a class id, falling back to `class_<id>` past the known table.
pub fn class_label(class_id: usize) -> String {
    COCO_CLASSES
        .get(class_id)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class_{}", class_id))
}

pub fn is_target(class_name: &str) -> bool {
    TARGET_CLASSES.contains(&class_name)
}

/// Translated display name, or the class name itself when untranslated.
pub fn display_name(class_name: &str) -> String {
    VOCABULARY
        .iter()
        .find(|(class, _, _)| *class == class_name)
        .map(|(_, display, _)| display.to_string())
        .unwrap_or_else(|| class_name.to_string())
}

/// Tool classification attached to every reported detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub category: String,
    pub tool_type: String,
    pub description: String,
}

pub fn classify_tool(class_name: &str) -> ToolInfo {
    let category = TOOL_CATEGORIES
        .iter()
        .find(|(_, tools)| tools.contains(&class_name))
        .map(|(category, _)| *category);

    match category {
        Some(category) => ToolInfo {
            category: category.to_string(),
            tool_type: class_name.to_string(),
            description: describe(class_name),
        },
        None => ToolInfo {
            category: "unknown".to_string(),
            tool_type: class_name.to_string(),
            description: format!("Detected object: {}", class_name),
        },
    }
}

fn describe(class_name: &str) -> String {
    VOCABULARY
        .iter()
        .find(|(class, _, _)| *class == class_name)
        .map(|(_, _, description)| description.to_string())
        .unwrap_or_else(|| format!("Detected object: {}", display_name(class_name)))
}

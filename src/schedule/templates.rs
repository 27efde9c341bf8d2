use serde::{Deserialize, Serialize};

/// Template used when the crop type has no template of its own
pub const DEFAULT_CROP_TYPE: &str = "tomato";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One step of a crop's activity plan, relative to the sowing date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityTemplateEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub offset_days: u32,
    pub priority: Priority,
}

const fn entry(
    name: &'static str,
    description: &'static str,
    offset_days: u32,
    priority: Priority,
) -> ActivityTemplateEntry {
    ActivityTemplateEntry {
        name,
        description,
        offset_days,
        priority,
    }
}

/// Name of the entry that marks the harvest in every template
pub const HARVEST_ACTIVITY: &str = "Cosecha";

const TOMATO: &[ActivityTemplateEntry] = &[
    entry("Preparación del suelo", "Arar y nivelar el terreno, incorporar materia orgánica", 0, Priority::High),
    entry("Riego inicial", "Riego profundo después de la siembra", 1, Priority::High),
    entry("Primera fertilización", "Aplicar fertilizante rico en fósforo", 15, Priority::Medium),
    entry("Control de malezas", "Deshierbe manual alrededor de las plantas", 30, Priority::Medium),
    entry("Tutorado", "Colocar tutores y amarrar las plantas", 35, Priority::Medium),
    entry("Segunda fertilización", "Aplicar fertilizante rico en potasio para la floración", 45, Priority::Medium),
    entry("Control de plagas", "Revisar hojas y frutos, aplicar tratamiento si es necesario", 60, Priority::High),
    entry("Poda de chupones", "Eliminar brotes laterales para mejorar la producción", 75, Priority::Low),
    entry(HARVEST_ACTIVITY, "Recolectar los frutos maduros", 120, Priority::High),
];

const LETTUCE: &[ActivityTemplateEntry] = &[
    entry("Preparación del suelo", "Mullir el suelo y formar camas de siembra", 0, Priority::High),
    entry("Riego inicial", "Riego ligero y frecuente para la germinación", 1, Priority::High),
    entry("Raleo", "Dejar una planta cada 25 cm", 15, Priority::Medium),
    entry("Fertilización", "Aplicar fertilizante nitrogenado", 20, Priority::Medium),
    entry("Control de malezas", "Deshierbe entre hileras", 25, Priority::Low),
    entry(HARVEST_ACTIVITY, "Cortar las cabezas formadas", 60, Priority::High),
];

const POTATO: &[ActivityTemplateEntry] = &[
    entry("Preparación del suelo", "Arado profundo y surcado", 0, Priority::High),
    entry("Riego inicial", "Riego por surcos después de la siembra", 1, Priority::High),
    entry("Primer aporque", "Cubrir la base de los tallos con tierra", 30, Priority::High),
    entry("Fertilización", "Aplicar fertilizante al momento del aporque", 35, Priority::Medium),
    entry("Control de plagas", "Vigilar gorgojo y rancha", 50, Priority::High),
    entry("Segundo aporque", "Reforzar el aporque antes de la floración", 60, Priority::Medium),
    entry(HARVEST_ACTIVITY, "Extraer los tubérculos con el follaje seco", 110, Priority::High),
];

const CARROT: &[ActivityTemplateEntry] = &[
    entry("Preparación del suelo", "Suelo suelto y sin piedras a 30 cm de profundidad", 0, Priority::High),
    entry("Riego inicial", "Mantener la humedad constante hasta la germinación", 1, Priority::High),
    entry("Raleo", "Dejar una planta cada 5 cm", 25, Priority::Medium),
    entry("Fertilización", "Aplicar fertilizante bajo en nitrógeno", 30, Priority::Medium),
    entry("Control de malezas", "Deshierbe cuidadoso sin dañar raíces", 40, Priority::Low),
    entry(HARVEST_ACTIVITY, "Extraer las raíces de tamaño comercial", 90, Priority::High),
];

const ONION: &[ActivityTemplateEntry] = &[
    entry("Preparación del suelo", "Nivelar el terreno y formar camas", 0, Priority::High),
    entry("Riego inicial", "Riego ligero para asentar el suelo", 1, Priority::High),
    entry("Fertilización", "Aplicar fertilizante nitrogenado fraccionado", 30, Priority::Medium),
    entry("Control de malezas", "Deshierbe frecuente en etapa temprana", 45, Priority::Medium),
    entry("Control de plagas", "Vigilar trips y aplicar tratamiento si es necesario", 70, Priority::High),
    entry("Suspensión del riego", "Reducir el riego para el curado de bulbos", 130, Priority::Medium),
    entry(HARVEST_ACTIVITY, "Arrancar los bulbos con el follaje doblado", 150, Priority::High),
];

const PEPPER: &[ActivityTemplateEntry] = &[
    entry("Preparación del suelo", "Arar e incorporar compost", 0, Priority::High),
    entry("Riego inicial", "Riego profundo después del trasplante", 1, Priority::High),
    entry("Fertilización", "Aplicar fertilizante balanceado", 20, Priority::Medium),
    entry("Tutorado", "Colocar soporte para evitar el quiebre de ramas", 40, Priority::Medium),
    entry("Control de plagas", "Revisar pulgones y ácaros", 55, Priority::High),
    entry(HARVEST_ACTIVITY, "Recolectar los frutos con color firme", 100, Priority::High),
];

/// Look up a template by its exact, already-normalized crop key
pub fn template_for_key(key: &str) -> Option<&'static [ActivityTemplateEntry]> {
    let template = match key {
        "tomato" | "tomate" => TOMATO,
        "lettuce" | "lechuga" => LETTUCE,
        "potato" | "papa" | "patata" => POTATO,
        "carrot" | "zanahoria" => CARROT,
        "onion" | "cebolla" => ONION,
        "pepper" | "pimiento" | "pimentón" => PEPPER,
        _ => return None,
    };
    Some(template)
}

/// Crop keys with a dedicated template, in English
pub fn known_crop_types() -> &'static [&'static str] {
    &["tomato", "lettuce", "potato", "carrot", "onion", "pepper"]
}

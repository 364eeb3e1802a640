//! Default catalog contents.

use lineflow_lifecycle::Phase;

/// Every phase gets its own state row by default.
pub(crate) const STATES: [Phase; 7] = Phase::ALL;

/// (code, description, scrap_tier)
pub(crate) const REPAIR_CODES: &[(&str, &str, bool)] = &[
    ("N001", "Equipo OK (sin reparación)", false),
    ("N002", "Limpieza general del equipo", false),
    ("N003", "Reemplazo de carcasa", false),
    ("N004", "Reemplazo de conectores externos", false),
    ("N005", "Reemplazo de botones", false),
    ("N006", "Reemplazo de antena", false),
    ("N007", "Reemplazo de fuente de poder", false),
    ("N008", "Reemplazo de LEDs indicadores", false),
    ("N009", "Reparación de ventilación", false),
    ("N010", "Reemplazo de etiquetas", false),
    ("N011", "Secado por humedad", false),
    ("N012", "Enfriamiento y ventilación adicional", false),
    ("N013", "Reemplazo de memoria", false),
    ("N014", "Actualización de firmware", false),
    ("N015", "Reconfiguración de software", false),
    ("N016", "Pruebas y calibración final", false),
    ("SC1", "Soldadura de componentes básicos", true),
    ("SC2", "Soldadura de conectores internos", true),
    ("SC3", "Reparación de circuito impreso", true),
];

/// (code, description, severity, repair code)
pub(crate) const DIAGNOSIS_CODES: &[(&str, &str, &str, Option<&str>)] = &[
    ("D000", "Sin daño aparente", "NA", None),
    ("D001", "Daño en carcasa", "NIVEL_1", Some("N003")),
    ("D002", "Daño en conectores externos", "NIVEL_1", Some("N004")),
    ("D003", "Daño en pantalla/display", "NIVEL_1", None),
    ("D004", "Daño en botones", "NIVEL_1", Some("N005")),
    ("D005", "Daño en antena", "NIVEL_1", Some("N006")),
    ("D006", "Daño en fuente de poder", "NIVEL_1", Some("N007")),
    ("D007", "Daño en LED indicadores", "NIVEL_1", Some("N008")),
    ("D008", "Daño en ventilación", "NIVEL_1", Some("N009")),
    ("D009", "Daño en etiquetas", "NIVEL_1", Some("N010")),
    ("D010", "Daño por humedad", "NIVEL_1", Some("N011")),
    ("D011", "Daño por sobrecalentamiento", "NIVEL_1", Some("N012")),
    ("D012", "Daño en circuito impreso", "NIVEL_2", Some("SC3")),
    ("D013", "Daño en capacitores", "NIVEL_2", Some("SC1")),
    ("D014", "Daño en resistencias", "NIVEL_2", Some("SC1")),
    ("D015", "Daño en transistores", "NIVEL_2", Some("SC1")),
    ("D016", "Daño en conectores internos", "NIVEL_2", Some("SC2")),
    ("D017", "Daño en memoria", "NIVEL_1", Some("N013")),
    ("D018", "Daño en procesador", "NIVEL_2", Some("SC3")),
    ("D019", "Daño en firmware/software", "NIVEL_1", Some("N014")),
    ("D020", "Daño por cortocircuito", "NIVEL_2", Some("SC3")),
    ("D021", "Daño por sobrevoltaje", "NIVEL_2", Some("SC3")),
    ("D022", "Daño en soldaduras", "NIVEL_2", Some("SC1")),
    ("D023", "Daño por corrosión", "NIVEL_2", Some("SC2")),
    ("D024", "Daño en chasis metálico", "NIVEL_1", Some("N003")),
    ("D025", "Otros daños no especificados", "NIVEL_1", Some("N016")),
    ("B001", "Bloque de daños múltiples", "NIVEL_2", Some("SC3")),
    ("B002", "Bloque de daños críticos", "NIVEL_2", Some("SC3")),
];

/// (material code, SKU name)
pub(crate) const SKUS: &[(&str, &str)] = &[
    ("72676", "V5SMALL"),
    ("66262", "V5"),
    ("69643", "FIBERHOME"),
    ("76735", "X6"),
    ("81809", "4KM36A"),
    ("69746", "4KM37"),
    ("69360", "4KM36B"),
    ("72608", "EXTENDERAP"),
    ("67278", "EXTENDERHUAWEI"),
    ("80333", "APEH7"),
    ("73488", "4KALEXA"),
    ("69644", "ZTE"),
    ("74497", "FIBERHOMEEXTENDED"),
    ("69358", "SOUNDBOX"),
];

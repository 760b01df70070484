//! Deterministic intent detection over lowercased, trimmed text.
//!
//! Bare digits 1/2/3 win outright; otherwise keyword tiers are tried in
//! declared order and the first match wins. Anything unmatched is free text
//! for the agents.

/// Closed set of recognized intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Menu option 1: my progress.
    Opcion1,
    /// Menu option 2: list courses.
    Opcion2,
    /// Menu option 3: continue lesson.
    Opcion3,
    Saludo,
    VerCursos,
    InscribirCurso,
    ContinuarLeccion,
    MiProgreso,
    IniciarExamen,
    VerRanking,
    Ayuda,
    CambiarNombre,
    /// A crop name used as an enrollment shortcut.
    Cultivo(&'static str),
    Desconocido,
}

/// Keywords that advance the current module inside `continuar_leccion`.
pub const ADVANCE_KEYWORDS: &[&str] = &["listo", "siguiente", "ok", "dale", "avanzar", "sigue"];

const SALUDO: &[&str] = &[
    "hola",
    "buenas",
    "buenos dias",
    "buenos días",
    "saludos",
    "que tal",
    "qué tal",
];

const VER_CURSOS: &[&str] = &["ver cursos", "cursos", "catalogo", "catálogo", "ver curso"];

const INSCRIBIR: &[&str] = &["inscribir", "inscribirme", "matricular", "quiero el curso"];

const CONTINUAR: &[&str] = &[
    "continuar",
    "continúa",
    "continua",
    "leccion",
    "lección",
    "listo",
    "siguiente",
    "ok",
    "dale",
    "avanzar",
    "sigue",
    "seguir",
];

const PROGRESO: &[&str] = &["progreso", "mi avance", "como voy", "cómo voy"];

const EXAMEN: &[&str] = &["examen", "evaluacion", "evaluación", "prueba"];

const RANKING: &[&str] = &["ranking", "clasificacion", "clasificación", "puntaje"];

const AYUDA: &[&str] = &["ayuda", "menu", "menú", "opciones", "help"];

const CAMBIAR_NOMBRE: &[&str] = &["mi nombre es", "me llamo"];

/// Crop aliases that enroll directly into the matching course.
pub const CROP_ALIASES: &[(&str, &str)] = &[
    ("cafe", "cafe"),
    ("café", "cafe"),
    ("cacao", "cacao"),
    ("aguacate", "aguacate"),
    ("platano", "platano"),
    ("plátano", "platano"),
    ("maiz", "maiz"),
    ("maíz", "maiz"),
];

/// Classify one inbound text.
pub fn detect(text: &str) -> Intent {
    let lower = text.trim().to_lowercase();

    if !lower.is_empty() && lower.chars().all(|c| c.is_ascii_digit()) {
        return match lower.as_str() {
            "1" => Intent::Opcion1,
            "2" => Intent::Opcion2,
            "3" => Intent::Opcion3,
            _ => Intent::Desconocido,
        };
    }

    let tiers: &[(&[&str], Intent)] = &[
        (SALUDO, Intent::Saludo),
        (VER_CURSOS, Intent::VerCursos),
        (INSCRIBIR, Intent::InscribirCurso),
        (CONTINUAR, Intent::ContinuarLeccion),
        (PROGRESO, Intent::MiProgreso),
        (EXAMEN, Intent::IniciarExamen),
        (RANKING, Intent::VerRanking),
        (AYUDA, Intent::Ayuda),
        (CAMBIAR_NOMBRE, Intent::CambiarNombre),
    ];

    for (keywords, intent) in tiers {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *intent;
        }
    }

    for (surface, canonical) in CROP_ALIASES {
        if contains_word(&lower, surface) {
            return Intent::Cultivo(canonical);
        }
    }

    Intent::Desconocido
}

/// Whether `text` contains any advance keyword as a whole word.
pub fn wants_advance(text: &str) -> bool {
    let lower = text.to_lowercase();
    ADVANCE_KEYWORDS.iter().any(|k| contains_word(&lower, k))
}

/// Parse a whole-text bare integer, if any.
pub fn bare_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Extract the new display name from a `cambiar_nombre` utterance.
pub fn parse_new_name(text: &str) -> Option<String> {
    for prefix in CAMBIAR_NOMBRE {
        if let Some(rest) = after_prefix_ci(text, prefix) {
            let name = rest
                .trim()
                .trim_matches(|c: char| c == '.' || c == ',' || c == '!');
            if !name.is_empty() {
                let name: String = name.chars().take(60).collect();
                return Some(name.trim().to_string());
            }
        }
    }
    None
}

/// Case-insensitive prefix search that never leaves the original string.
///
/// Lowercasing the whole text can shift byte offsets (some characters change
/// length when lowercased), so matching is done char by char and the returned
/// slice comes straight out of `text`.
fn after_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    for (start, _) in text.char_indices() {
        let mut matched = 0;
        let mut rest = text[start..].chars();
        let mut found = true;
        for p in prefix.chars() {
            match rest.next() {
                Some(c) if c.to_lowercase().eq(p.to_lowercase()) => matched += c.len_utf8(),
                _ => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            return Some(&text[start + matched..]);
        }
    }
    None
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric() && c != 'á' && c != 'é' && c != 'í' && c != 'ó' && c != 'ú' && c != 'ñ')
        .any(|w| w == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_digits_take_priority() {
        assert_eq!(detect("1"), Intent::Opcion1);
        assert_eq!(detect(" 2 "), Intent::Opcion2);
        assert_eq!(detect("3"), Intent::Opcion3);
        assert_eq!(detect("7"), Intent::Desconocido);
    }

    #[test]
    fn test_keyword_tiers_in_order() {
        assert_eq!(detect("Hola, buenas tardes"), Intent::Saludo);
        assert_eq!(detect("ver cursos"), Intent::VerCursos);
        assert_eq!(detect("quiero inscribirme"), Intent::InscribirCurso);
        assert_eq!(detect("listo"), Intent::ContinuarLeccion);
        assert_eq!(detect("como voy en mi progreso"), Intent::MiProgreso);
        assert_eq!(detect("iniciar examen"), Intent::IniciarExamen);
        assert_eq!(detect("ver ranking"), Intent::VerRanking);
        assert_eq!(detect("ayuda"), Intent::Ayuda);
        assert_eq!(detect("mi nombre es Ana"), Intent::CambiarNombre);
    }

    #[test]
    fn test_crop_aliases() {
        assert_eq!(detect("café"), Intent::Cultivo("cafe"));
        assert_eq!(detect("quiero aprender de cacao"), Intent::Cultivo("cacao"));
        assert_eq!(detect("maíz"), Intent::Cultivo("maiz"));
    }

    #[test]
    fn test_free_text_is_unknown() {
        assert_eq!(
            detect("¿cada cuánto debo abonar los frutales?"),
            Intent::Desconocido
        );
    }

    #[test]
    fn test_wants_advance_is_word_bounded() {
        assert!(wants_advance("listo"));
        assert!(wants_advance("¡dale!"));
        assert!(!wants_advance("solisto"));
    }

    #[test]
    fn test_bare_integer() {
        assert_eq!(bare_integer(" 12 "), Some(12));
        assert_eq!(bare_integer("12a"), None);
        assert_eq!(bare_integer(""), None);
    }

    #[test]
    fn test_parse_new_name() {
        assert_eq!(parse_new_name("mi nombre es Ana María"), Some("Ana María".into()));
        assert_eq!(parse_new_name("Me llamo Pedro."), Some("Pedro".into()));
        assert_eq!(parse_new_name("me llamo"), None);
    }

    #[test]
    fn test_parse_new_name_survives_length_shifting_chars() {
        // U+0130 grows from 2 to 3 bytes when lowercased; a byte offset from
        // the lowered copy would not be a boundary in the original.
        assert_eq!(parse_new_name("İİ mi nombre es Ágata"), Some("Ágata".into()));
        assert_eq!(parse_new_name("ẞ me llamo Rosa"), Some("Rosa".into()));
    }

    #[test]
    fn test_parse_new_name_is_case_insensitive() {
        assert_eq!(parse_new_name("MI NOMBRE ES Rosa"), Some("Rosa".into()));
    }

    #[test]
    fn test_parse_new_name_caps_multibyte_names() {
        let long = format!("mi nombre es {}", "á".repeat(80));
        let name = parse_new_name(&long).unwrap();
        assert_eq!(name.chars().count(), 60);
    }
}

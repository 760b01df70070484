//! Pure text rendering for the deterministic intents.
//!
//! Everything here is a function of its arguments; store reads happen in the
//! callers so the same inputs always produce the same text.

use siembra_core::markers;
use siembra_memory::{Course, Module, Student};

/// Advisory shown when a module's media resolves to an address the
/// providers cannot fetch.
pub const LOOPBACK_ADVISORY: &str =
    "ℹ️ El video de este módulo está disponible cuando la plataforma esté publicada en internet.";

const MENU: &str = "¿Qué quieres hacer?\n\
                    1️⃣ Mi progreso\n\
                    2️⃣ Ver cursos\n\
                    3️⃣ Continuar mi lección\n\n\
                    También puedes escribirme lo que necesites, o enviarme una nota de voz. 🎙️";

/// Where a module's media reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMedia {
    /// An absolute URL the adapters can attach.
    Url(String),
    /// The URL points at loopback; suppress the attachment.
    Loopback,
    None,
}

/// Resolve a module media reference to an absolute URL.
///
/// Uploaded-file paths get the public base URL prefixed; external URLs pass
/// through. Loopback results are flagged so the renderer can inline the
/// advisory instead.
pub fn resolve_media(media_ref: Option<&str>, public_base_url: &str) -> ResolvedMedia {
    let Some(media_ref) = media_ref.map(str::trim).filter(|r| !r.is_empty()) else {
        return ResolvedMedia::None;
    };

    let url = if media_ref.starts_with("http://") || media_ref.starts_with("https://") {
        media_ref.to_string()
    } else {
        format!(
            "{}/{}",
            public_base_url.trim_end_matches('/'),
            media_ref.trim_start_matches('/')
        )
    };

    if markers::is_loopback_url(&url) {
        ResolvedMedia::Loopback
    } else {
        ResolvedMedia::Url(url)
    }
}

/// First-contact welcome. Must open with "Hola <name>".
pub fn welcome(student: &Student) -> String {
    format!(
        "Hola {}! 👋 Soy Siembra, tu acompañante de aprendizaje agrícola por WhatsApp.\n\n{MENU}",
        student.display_name
    )
}

pub fn greeting(student: &Student) -> String {
    format!("Hola {}! 🌱\n\n{MENU}", student.display_name)
}

pub fn help() -> String {
    format!("Con gusto te ayudo. 🌱\n\n{MENU}")
}

/// Numbered list of active courses. Carries the selector sentinel so a
/// bare-number reply enrolls in that course.
pub fn course_list(courses: &[Course]) -> String {
    if courses.is_empty() {
        return "Por ahora no hay cursos disponibles. Vuelve pronto. 🌱".to_string();
    }

    let mut out = String::from("📚 *Cursos disponibles:*\n\n");
    push_course_lines(&mut out, courses);
    out.push_str("\nResponde con el número del curso para inscribirte.");
    out.push_str(markers::COURSE_SELECTOR);
    out
}

/// The same list framed as a question, carrying the selector sentinel so the
/// next bare-number reply is read as a course choice.
pub fn course_selector(courses: &[Course]) -> String {
    let mut out = String::from("¿A cuál curso te quieres inscribir? 🌱\n\n");
    push_course_lines(&mut out, courses);
    out.push_str("\nResponde con el número del curso.");
    out.push_str(markers::COURSE_SELECTOR);
    out
}

fn push_course_lines(out: &mut String, courses: &[Course]) {
    for (i, course) in courses.iter().enumerate() {
        out.push_str(&format!("{}. {} {}\n", i + 1, course.emoji, course.title));
    }
}

/// One line of the progress report.
#[derive(Debug, Clone)]
pub struct ProgressLine {
    pub course: Course,
    pub completions: i64,
    pub total_modules: i64,
    pub completed: bool,
}

pub fn progress_report(student: &Student, lines: &[ProgressLine]) -> String {
    if lines.is_empty() {
        return format!(
            "{}, todavía no estás en ningún curso. Escribe *2* para ver los cursos disponibles. 🌱",
            student.display_name
        );
    }

    let mut out = format!("📈 *Tu progreso, {}:*\n\n", student.display_name);
    for line in lines {
        let pct = progress_pct(line.completions, line.total_modules);
        let state = if line.completed {
            "✅ completado".to_string()
        } else {
            format!("{}/{} módulos ({pct}%)", line.completions, line.total_modules)
        };
        out.push_str(&format!(
            "{} {}: {state}\n",
            line.course.emoji, line.course.title
        ));
    }
    out.push_str("\nEscribe *3* para continuar con tu lección.");
    out
}

pub fn progress_pct(completions: i64, total_modules: i64) -> u32 {
    if total_modules <= 0 {
        return 0;
    }
    ((completions * 100) / total_modules).clamp(0, 100) as u32
}

pub fn ranking_placeholder() -> String {
    "🏆 El ranking de estudiantes estará disponible muy pronto. \
     Mientras tanto, cada módulo que completas suma. 🌱"
        .to_string()
}

pub fn exam_entry() -> String {
    "📝 Los exámenes se habilitan al terminar cada curso. \
     Escribe *3* para continuar con tu lección y llegar al examen."
        .to_string()
}

pub fn name_confirmation(name: &str) -> String {
    format!("¡Listo, {name}! 📝 Así te llamaré de ahora en adelante.")
}

pub fn name_parse_failure() -> String {
    "No entendí tu nombre. Escríbeme por ejemplo: *mi nombre es Ana María*.".to_string()
}

pub fn no_active_course() -> String {
    "No tienes ningún curso activo. Escribe *2* para ver los cursos disponibles \
     e inscríbete en uno. 🌱"
        .to_string()
}

pub fn course_not_found(wanted: &str) -> String {
    format!(
        "No encontré un curso que coincida con \"{wanted}\". \
         Escribe *2* para ver los cursos disponibles."
    )
}

pub fn already_completed(course: &Course) -> String {
    format!(
        "🎓 Ya completaste *{}* {}. ¡Felicitaciones de nuevo! \
         Escribe *2* si quieres empezar otro curso.",
        course.title, course.emoji
    )
}

pub fn course_completed(course: &Course, total_modules: i64) -> String {
    format!(
        "🎉 ¡Felicitaciones! Completaste los {total_modules} módulos de *{}* {}.\n\n\
         Has terminado el curso. Escribe *2* para ver qué más puedes aprender. 🌱",
        course.title, course.emoji
    )
}

/// Empty-text nudge (e.g. a media-only message with no caption).
pub fn empty_message_nudge() -> String {
    format!("Recibí tu mensaje pero venía sin texto. 🌱\n\n{MENU}")
}

/// Apology used when a turn fails past the point of no return.
pub fn system_apology() -> String {
    "Tuvimos un inconveniente procesando tu mensaje. \
     Inténtalo de nuevo en unos minutos, por favor. 🙏"
        .to_string()
}

/// Render a module for delivery: header, body, media block, advance footer.
pub fn render_module(
    course: &Course,
    module: &Module,
    total_modules: i64,
    public_base_url: &str,
) -> String {
    let mut out = format!(
        "📚 *{}* {}\n\n*Módulo {} de {total_modules}: {}*\n\n{}",
        course.title, course.emoji, module.number, module.title, module.body
    );

    match resolve_media(module.media_ref.as_deref(), public_base_url) {
        ResolvedMedia::Url(url) => {
            out.push_str(&format!("\n\n{}\n{url}", markers::VIDEO_BLOCK_PREFIX));
        }
        ResolvedMedia::Loopback => {
            out.push_str(&format!("\n\n{LOOPBACK_ADVISORY}"));
        }
        ResolvedMedia::None => {}
    }

    out.push_str("\n\nCuando termines, escribe *listo* para avanzar al siguiente módulo. ✅");
    out
}

//! Demo course catalog for fresh installs.

use crate::store::{new_course, new_module, Store};
use siembra_core::error::SiembraError;
use tracing::info;

/// Populate the catalog with the demo courses if it is empty.
///
/// Runs at startup; a non-empty catalog is left untouched so authored
/// content never gets mixed with demo rows.
pub async fn seed_demo_courses(store: &Store) -> Result<(), SiembraError> {
    if !store.list_active_courses().await?.is_empty() {
        return Ok(());
    }

    let catalog: &[(&str, &str, &[(&str, &str)])] = &[
        (
            "Cultivo de Café",
            "☕",
            &[
                (
                    "Preparación del terreno",
                    "Aprende a seleccionar y preparar el lote: análisis de suelo, \
                     trazado y ahoyado para las plántulas de café.",
                ),
                (
                    "Siembra y germinación",
                    "Del germinador al almácigo: cuidados de la chapola y el \
                     momento correcto para llevarla al campo.",
                ),
                (
                    "Manejo de la broca",
                    "Identifica la broca del café y aplica el manejo integrado: \
                     recolección oportuna, trampas y control biológico.",
                ),
                (
                    "Cosecha y beneficio",
                    "Recolección selectiva de cerezas maduras, despulpado, \
                     fermentación y secado para un café de calidad.",
                ),
            ],
        ),
        (
            "Cultivo de Cacao",
            "🍫",
            &[
                (
                    "Establecimiento del cultivo",
                    "Selección de clones, sombrío transitorio y permanente, y \
                     distancias de siembra para el cacaotal.",
                ),
                (
                    "Podas y manejo del árbol",
                    "Poda de formación y mantenimiento para mantener el árbol \
                     productivo y facilitar la cosecha.",
                ),
                (
                    "Fermentación y secado",
                    "El beneficio del grano: fermentación en cajones, volteos y \
                     secado al sol para desarrollar aroma y sabor.",
                ),
            ],
        ),
        (
            "Cultivo de Aguacate",
            "🥑",
            &[
                (
                    "Variedades y vivero",
                    "Hass, papelillo y criollos: cómo elegir la variedad para tu \
                     altitud y conseguir material de vivero sano.",
                ),
                (
                    "Nutrición y riego",
                    "Plan de fertilización según análisis de suelo y manejo del \
                     agua en épocas secas.",
                ),
                (
                    "Plagas y enfermedades",
                    "Monitoreo y manejo de la marchitez por Phytophthora y las \
                     plagas del fruto.",
                ),
            ],
        ),
        (
            "Cultivo de Plátano",
            "🍌",
            &[
                (
                    "Semilla y siembra",
                    "Selección de cormos sanos, desinfección y siembra del \
                     platanal.",
                ),
                (
                    "Manejo de sigatoka",
                    "Deshoje sanitario y prácticas culturales para convivir con \
                     la sigatoka negra.",
                ),
                (
                    "Cosecha y poscosecha",
                    "Punto de corte, desmane y manejo del racimo para llegar \
                     bien al mercado.",
                ),
            ],
        ),
        (
            "Cultivo de Maíz",
            "🌽",
            &[
                (
                    "Preparación y siembra",
                    "Preparación del suelo, densidad de siembra y elección de la \
                     semilla para tu zona.",
                ),
                (
                    "Manejo del cultivo",
                    "Fertilización, control de arvenses y manejo del gusano \
                     cogollero.",
                ),
                (
                    "Cosecha y almacenamiento",
                    "Punto de madurez, secado de la mazorca y almacenamiento sin \
                     gorgojo.",
                ),
            ],
        ),
    ];

    for (position, (title, emoji, modules)) in catalog.iter().enumerate() {
        let course = new_course(title, emoji, position as i64 + 1);
        store.insert_course(&course).await?;
        for (number, (module_title, body)) in modules.iter().enumerate() {
            let module = new_module(&course.id, number as i64 + 1, module_title, body);
            store.insert_module(&module).await?;
        }
    }

    info!("seeded demo catalog: {} courses", catalog.len());
    Ok(())
}

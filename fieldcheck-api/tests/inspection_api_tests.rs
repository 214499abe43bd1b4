//! Integration tests for inspection endpoints: answer-tree writes,
//! criticality caching, replace-on-update, photo cleanup, and tenant
//! isolation.

mod helpers;

use axum::http::StatusCode;
use helpers::{authed_request, send, setup_app, setup_test_db, ASSET_A, PROFILE_A, PROFILE_B};
use serde_json::{json, Value};
use uuid::Uuid;

/// Client-assigned ids of the seeded questionnaire, so answers can
/// reference questions and options directly.
struct Fixture {
    questionnaire: Uuid,
    grid: Uuid,
    member_a: Uuid,
    member_b: Uuid,
    opt_good: Uuid,
    opt_rusty: Uuid,
    numeric: Uuid,
    single: Uuid,
    opt_present: Uuid,
    opt_missing: Uuid,
}

impl Fixture {
    fn new() -> Self {
        Self {
            questionnaire: Uuid::new_v4(),
            grid: Uuid::new_v4(),
            member_a: Uuid::new_v4(),
            member_b: Uuid::new_v4(),
            opt_good: Uuid::new_v4(),
            opt_rusty: Uuid::new_v4(),
            numeric: Uuid::new_v4(),
            single: Uuid::new_v4(),
            opt_present: Uuid::new_v4(),
            opt_missing: Uuid::new_v4(),
        }
    }

    fn questionnaire_doc(&self) -> Value {
        json!({
            "id": self.questionnaire,
            "tipo_de_inspeccion": "torre electrica",
            "version": 1,
            "periodicidad_dias": 90,
            "bloques": [
                {
                    "n_orden": 0,
                    "pregunta": {
                        "id": self.grid,
                        "titulo": "Estado de las patas",
                        "criticidad": 3,
                        "tipo_de_pregunta": "cuadricula",
                        "tipo_de_cuadricula": "seleccion_unica",
                        "opciones_de_respuesta": [
                            {"id": self.opt_good, "titulo": "Buena", "criticidad": 0},
                            {"id": self.opt_rusty, "titulo": "Oxidada", "criticidad": 5}
                        ],
                        "preguntas": [
                            {"id": self.member_a, "titulo": "Pata A", "criticidad": 1,
                             "tipo_de_pregunta": "parte_de_cuadricula"},
                            {"id": self.member_b, "titulo": "Pata B", "criticidad": 1,
                             "tipo_de_pregunta": "parte_de_cuadricula"}
                        ]
                    }
                },
                {
                    "n_orden": 1,
                    "pregunta": {
                        "id": self.numeric,
                        "titulo": "Inclinacion",
                        "criticidad": 2,
                        "tipo_de_pregunta": "numerica",
                        "unidades": "grados",
                        "criticidades_numericas": [
                            {"id": Uuid::new_v4(), "valor_minimo": 0.0, "valor_maximo": 2.0, "criticidad": 0},
                            {"id": Uuid::new_v4(), "valor_minimo": 2.0, "valor_maximo": 90.0, "criticidad": 8}
                        ]
                    }
                },
                {
                    "n_orden": 2,
                    "pregunta": {
                        "id": self.single,
                        "titulo": "Placa de identificacion",
                        "criticidad": 1,
                        "tipo_de_pregunta": "seleccion_unica",
                        "opciones_de_respuesta": [
                            {"id": self.opt_present, "titulo": "Presente", "criticidad": 0},
                            {"id": self.opt_missing, "titulo": "Ausente", "criticidad": 5,
                             "requiere_criticidad_del_inspector": false}
                        ]
                    }
                }
            ]
        })
    }

    async fn seed(&self, app: &axum::Router) {
        let (status, _) = send(
            app,
            authed_request(
                "POST",
                "/api/cuestionarios",
                PROFILE_A,
                Some(self.questionnaire_doc()),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    fn grid_answer(&self, option_a: Uuid, option_b: Uuid, b_repaired: bool) -> Value {
        json!({
            "pregunta": self.grid,
            "tipo_de_respuesta": "cuadricula",
            "subrespuestas_cuadricula": [
                {"pregunta": self.member_a, "tipo_de_respuesta": "seleccion_unica",
                 "opcion_seleccionada": option_a},
                {"pregunta": self.member_b, "tipo_de_respuesta": "seleccion_unica",
                 "opcion_seleccionada": option_b, "reparado": b_repaired,
                 "observacion_reparacion": (if b_repaired { "soldadura nueva" } else { "" })}
            ]
        })
    }
}

fn inspection_doc(id: &str, fixture: &Fixture, respuestas: Value) -> Value {
    json!({
        "id": id,
        "cuestionario": fixture.questionnaire,
        "activo": ASSET_A,
        "momento_inicio": "2026-08-01T09:00:00Z",
        "respuestas": respuestas
    })
}

#[tokio::test]
async fn block_level_single_choice_scores_its_option_weight() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    let doc = inspection_doc(
        "insp-000",
        &fixture,
        json!([{"pregunta": fixture.single, "tipo_de_respuesta": "seleccion_unica",
                "opcion_seleccionada": fixture.opt_missing,
                "observacion": "placa arrancada"}]),
    );
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(body["criticidad_calculada"], 5);
    let answer = &body["respuestas"][0];
    assert_eq!(answer["criticidad_calculada"], 5);
    assert_eq!(answer["opcion_seleccionada"], fixture.opt_missing.to_string());
    assert_eq!(answer["observacion"], "placa arrancada");
}

#[tokio::test]
async fn single_choice_answer_caches_its_criticality() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    let doc = inspection_doc(
        "insp-001",
        &fixture,
        json!([fixture.grid_answer(fixture.opt_good, fixture.opt_rusty, false)]),
    );
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // the rusty option (weight 5) drives the grid and the inspection
    assert_eq!(body["criticidad_calculada"], 5);
    assert_eq!(body["criticidad_calculada_con_reparaciones"], 5);
    assert_eq!(body["estado"], "borrador");

    let grid = &body["respuestas"][0];
    assert_eq!(grid["criticidad_calculada"], 5);
    let subs = grid["subrespuestas_cuadricula"].as_array().unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0]["criticidad_calculada"], 0);
    assert_eq!(subs[1]["criticidad_calculada"], 5);
}

#[tokio::test]
async fn repaired_answer_collapses_in_the_second_figure() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    let doc = inspection_doc(
        "insp-002",
        &fixture,
        json!([fixture.grid_answer(fixture.opt_good, fixture.opt_rusty, true)]),
    );
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(body["criticidad_calculada"], 5);
    assert_eq!(body["criticidad_calculada_con_reparaciones"], 0);
}

#[tokio::test]
async fn numeric_band_and_inspector_override() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    // 30 degrees falls in the second band (criticality 8)
    let doc = inspection_doc(
        "insp-003",
        &fixture,
        json!([{"pregunta": fixture.numeric, "tipo_de_respuesta": "numerica",
                "valor_numerico": 30.0}]),
    );
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["criticidad_calculada"], 8);

    // the inspector's figure replaces the resolved one
    let doc = inspection_doc(
        "insp-004",
        &fixture,
        json!([{"pregunta": fixture.numeric, "tipo_de_respuesta": "numerica",
                "valor_numerico": 30.0, "criticidad_del_inspector": 2}]),
    );
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["criticidad_calculada"], 2);
}

#[tokio::test]
async fn put_replaces_the_answer_tree_and_attached_photos() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db.clone(), media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    // a pre-uploaded photo referenced by the first answer tree
    let photo_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO answer_photos (id, file_path, uploaded_at)
         VALUES (?, 'fotos_inspecciones/old.jpg', '2026-08-01T09:00:00Z')",
    )
    .bind(photo_id.to_string())
    .execute(&db)
    .await
    .unwrap();

    let mut first = inspection_doc(
        "insp-005",
        &fixture,
        json!([fixture.grid_answer(fixture.opt_rusty, fixture.opt_rusty, false)]),
    );
    first["respuestas"][0]["subrespuestas_cuadricula"][0]["fotos_base"] = json!([photo_id]);
    let (status, _) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-005", PROFILE_A, Some(first)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let answers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answers")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(answers, 3);

    // replacement carries only the numeric answer
    let second = inspection_doc(
        "insp-005",
        &fixture,
        json!([{"pregunta": fixture.numeric, "tipo_de_respuesta": "numerica",
                "valor_numerico": 1.0}]),
    );
    let (status, body) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-005", PROFILE_A, Some(second)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["criticidad_calculada"], 0);
    assert_eq!(body["respuestas"].as_array().unwrap().len(), 1);

    // the old tree is gone and its photo row cascaded away with it
    let answers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answers")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(answers, 1);
    let photos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answer_photos")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(photos, 0);
}

#[tokio::test]
async fn failed_replace_leaves_the_old_tree_intact() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db.clone(), media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    let first = inspection_doc(
        "insp-009",
        &fixture,
        json!([fixture.grid_answer(fixture.opt_good, fixture.opt_rusty, false)]),
    );
    let (status, _) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-009", PROFILE_A, Some(first)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // replacement references an unknown question and must roll back
    let bad = inspection_doc(
        "insp-009",
        &fixture,
        json!([{"pregunta": Uuid::new_v4(), "tipo_de_respuesta": "numerica",
                "valor_numerico": 1.0}]),
    );
    let (status, _) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-009", PROFILE_A, Some(bad)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        authed_request("GET", "/api/inspecciones/insp-009", PROFILE_A, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["criticidad_calculada"], 5);
    assert_eq!(
        body["respuestas"][0]["subrespuestas_cuadricula"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn replace_cannot_relink_questionnaire_or_asset() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    // a second questionnaire in the same organization
    let other = Fixture::new();
    let mut other_doc = other.questionnaire_doc();
    other_doc["version"] = json!(2);
    let (status, _) = send(
        &app,
        authed_request("POST", "/api/cuestionarios", PROFILE_A, Some(other_doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let first = inspection_doc(
        "insp-010",
        &fixture,
        json!([fixture.grid_answer(fixture.opt_good, fixture.opt_rusty, false)]),
    );
    let (status, _) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-010", PROFILE_A, Some(first)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // a replace citing the other questionnaire must not move the header
    let bad = inspection_doc(
        "insp-010",
        &other,
        json!([other.grid_answer(other.opt_good, other.opt_good, false)]),
    );
    let (status, body) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-010", PROFILE_A, Some(bad)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
    let campos = body["error"]["campos"].as_array().unwrap();
    assert!(campos.iter().any(|c| c["campo"] == "cuestionario"));

    // nor may it move the inspection to another asset
    let (status, _) = send(
        &app,
        authed_request(
            "PUT",
            "/api/activos/torre-002",
            PROFILE_A,
            Some(json!({"etiquetas": []})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut bad = inspection_doc(
        "insp-010",
        &fixture,
        json!([fixture.grid_answer(fixture.opt_good, fixture.opt_rusty, false)]),
    );
    bad["activo"] = json!("torre-002");
    let (status, body) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-010", PROFILE_A, Some(bad)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let campos = body["error"]["campos"].as_array().unwrap();
    assert!(campos.iter().any(|c| c["campo"] == "activo"));

    // the stored linkage and the old tree are untouched
    let (status, body) = send(
        &app,
        authed_request("GET", "/api/inspecciones/insp-010", PROFILE_A, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cuestionario"], fixture.questionnaire.to_string());
    assert_eq!(body["activo"], ASSET_A);
    assert_eq!(body["criticidad_calculada"], 5);
}

#[tokio::test]
async fn replace_failing_after_teardown_keeps_the_old_tree() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db.clone(), media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    let first = inspection_doc(
        "insp-011",
        &fixture,
        json!([fixture.grid_answer(fixture.opt_good, fixture.opt_rusty, false)]),
    );
    let (status, _) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-011", PROFILE_A, Some(first)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // the replacement validates cleanly but claims a photo that does not
    // exist, so it fails only after the old tree was torn down
    let bad = inspection_doc(
        "insp-011",
        &fixture,
        json!([{"pregunta": fixture.numeric, "tipo_de_respuesta": "numerica",
                "valor_numerico": 1.0, "fotos_base": [Uuid::new_v4()]}]),
    );
    let (status, body) = send(
        &app,
        authed_request("PUT", "/api/inspecciones/insp-011", PROFILE_A, Some(bad)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    // the teardown rolled back with the rest of the replace
    let answers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answers")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(answers, 3);

    let (status, body) = send(
        &app,
        authed_request("GET", "/api/inspecciones/insp-011", PROFILE_A, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["criticidad_calculada"], 5);
    assert_eq!(
        body["respuestas"][0]["subrespuestas_cuadricula"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn invalid_answer_writes_nothing() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db.clone(), media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    // unknown kind string fails at deserialization, inside the same error
    // envelope as every other client error
    let doc = inspection_doc(
        "insp-006",
        &fixture,
        json!([{"pregunta": fixture.numeric, "tipo_de_respuesta": "desconocida",
                "valor_numerico": 1.0}]),
    );
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    // kind mismatching the question fails validation with a field path
    let doc = inspection_doc(
        "insp-006",
        &fixture,
        json!([{"pregunta": fixture.numeric, "tipo_de_respuesta": "cuadricula"}]),
    );
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
    let campos = body["error"]["campos"].as_array().unwrap();
    assert!(campos
        .iter()
        .any(|c| c["campo"] == "respuestas[0].tipo_de_respuesta"));

    let inspections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inspections")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(inspections, 0);
    let answers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answers")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(answers, 0);
}

#[tokio::test]
async fn inspections_are_tenant_scoped() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    // organization B cannot submit against A's questionnaire
    let doc = inspection_doc("insp-007", &fixture, json!([]));
    let (status, _) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_B, Some(doc.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A submits, B cannot read it
    let (status, _) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        authed_request("GET", "/api/inspecciones/insp-007", PROFILE_B, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        authed_request("GET", "/api/inspecciones", PROFILE_A, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_post_is_a_conflict() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    let doc = inspection_doc("insp-008", &fixture, json!([]));
    let (status, _) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn id_collision_across_organizations_is_a_conflict() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());
    let fixture = Fixture::new();
    fixture.seed(&app).await;

    let doc = inspection_doc("insp-012", &fixture, json!([]));
    let (status, _) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // organization B, with its own questionnaire and asset, cannot claim
    // the same inspection id
    let fixture_b = Fixture::new();
    let (status, _) = send(
        &app,
        authed_request(
            "POST",
            "/api/cuestionarios",
            PROFILE_B,
            Some(fixture_b.questionnaire_doc()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &app,
        authed_request(
            "PUT",
            "/api/activos/torre-b",
            PROFILE_B,
            Some(json!({"etiquetas": []})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut doc = inspection_doc("insp-012", &fixture_b, json!([]));
    doc["activo"] = json!("torre-b");
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/inspecciones", PROFILE_B, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // the colliding inspection itself stays invisible
    let (status, _) = send(
        &app,
        authed_request("GET", "/api/inspecciones/insp-012", PROFILE_B, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

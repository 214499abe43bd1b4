//! Integration tests for questionnaire endpoints: nested document writes,
//! read-back, upsert replacement, duplicate-version conflicts, and tenant
//! isolation.

mod helpers;

use axum::http::StatusCode;
use helpers::{authed_request, send, setup_app, setup_test_db, PROFILE_A, PROFILE_B};
use serde_json::{json, Value};
use uuid::Uuid;

fn grid_questionnaire(id: Uuid, version: i64) -> Value {
    json!({
        "id": id,
        "tipo_de_inspeccion": "torre electrica",
        "version": version,
        "periodicidad_dias": 90,
        "etiquetas_aplicables": [{"clave": "zona", "valor": "norte"}],
        "bloques": [
            {
                "n_orden": 0,
                "titulo": {
                    "id": Uuid::new_v4(),
                    "titulo": "Estructura",
                    "descripcion": "Revision general"
                }
            },
            {
                "n_orden": 1,
                "pregunta": {
                    "id": Uuid::new_v4(),
                    "titulo": "Estado de las patas",
                    "criticidad": 3,
                    "tipo_de_pregunta": "cuadricula",
                    "tipo_de_cuadricula": "seleccion_unica",
                    "opciones_de_respuesta": [
                        {"id": Uuid::new_v4(), "titulo": "Buena", "criticidad": 0},
                        {"id": Uuid::new_v4(), "titulo": "Oxidada", "criticidad": 5}
                    ],
                    "preguntas": [
                        {
                            "id": Uuid::new_v4(),
                            "titulo": "Pata A",
                            "criticidad": 1,
                            "tipo_de_pregunta": "parte_de_cuadricula"
                        },
                        {
                            "id": Uuid::new_v4(),
                            "titulo": "Pata B",
                            "criticidad": 1,
                            "tipo_de_pregunta": "parte_de_cuadricula"
                        }
                    ]
                }
            },
            {
                "n_orden": 2,
                "pregunta": {
                    "id": Uuid::new_v4(),
                    "titulo": "Inclinacion",
                    "criticidad": 2,
                    "tipo_de_pregunta": "numerica",
                    "unidades": "grados",
                    "criticidades_numericas": [
                        {"id": Uuid::new_v4(), "valor_minimo": 0.0, "valor_maximo": 2.0, "criticidad": 0},
                        {"id": Uuid::new_v4(), "valor_minimo": 2.0, "valor_maximo": 90.0, "criticidad": 8}
                    ]
                }
            }
        ]
    })
}

#[tokio::test]
async fn create_and_read_back_nested_questionnaire() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db.clone(), media.path());

    let id = Uuid::new_v4();
    let doc = grid_questionnaire(id, 1);
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/cuestionarios", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["etiquetas_aplicables"][0]["clave"], "zona");

    let (status, body) = send(
        &app,
        authed_request("GET", &format!("/api/cuestionarios/{}", id), PROFILE_A, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let bloques = body["bloques"].as_array().unwrap();
    assert_eq!(bloques.len(), 3);
    assert_eq!(bloques[0]["titulo"]["titulo"], "Estructura");
    assert!(bloques[0]["pregunta"].is_null());

    let grid = &bloques[1]["pregunta"];
    assert_eq!(grid["tipo_de_pregunta"], "cuadricula");
    assert_eq!(grid["tipo_de_cuadricula"], "seleccion_unica");
    assert_eq!(grid["opciones_de_respuesta"].as_array().unwrap().len(), 2);
    let members = grid["preguntas"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["titulo"], "Pata A");
    assert_eq!(members[1]["titulo"], "Pata B");

    let numeric = &bloques[2]["pregunta"];
    assert_eq!(numeric["unidades"], "grados");
    let bands = numeric["criticidades_numericas"].as_array().unwrap();
    assert_eq!(bands[0]["criticidad"], 0);
    assert_eq!(bands[1]["criticidad"], 8);
}

#[tokio::test]
async fn duplicate_version_is_a_conflict() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());

    let (status, _) = send(
        &app,
        authed_request(
            "POST",
            "/api/cuestionarios",
            PROFILE_A,
            Some(grid_questionnaire(Uuid::new_v4(), 1)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // same type and version, different id
    let (status, body) = send(
        &app,
        authed_request(
            "POST",
            "/api/cuestionarios",
            PROFILE_A,
            Some(grid_questionnaire(Uuid::new_v4(), 1)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn invalid_question_kind_writes_nothing() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db.clone(), media.path());

    // unknown kind string is rejected at deserialization, inside the same
    // error envelope as every other client error
    let mut doc = grid_questionnaire(Uuid::new_v4(), 1);
    doc["bloques"][1]["pregunta"]["tipo_de_pregunta"] = json!("desconocido");
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/cuestionarios", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    // absent kind is rejected by validation with a field path
    let mut doc = grid_questionnaire(Uuid::new_v4(), 1);
    doc["bloques"][1]["pregunta"].as_object_mut().unwrap().remove("tipo_de_pregunta");
    let (status, body) = send(
        &app,
        authed_request("POST", "/api/cuestionarios", PROFILE_A, Some(doc)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
    let campos = body["error"]["campos"].as_array().unwrap();
    assert!(campos
        .iter()
        .any(|c| c["campo"] == "bloques[1].pregunta.tipo_de_pregunta"));

    // nothing was persisted
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questionnaires")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(count, 0);
    let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(questions, 0);
}

#[tokio::test]
async fn put_replaces_the_whole_tree() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db.clone(), media.path());

    let id = Uuid::new_v4();
    let (status, _) = send(
        &app,
        authed_request(
            "PUT",
            &format!("/api/cuestionarios/{}", id),
            PROFILE_A,
            Some(grid_questionnaire(id, 1)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // replacement drops the grid block entirely
    let replacement = json!({
        "id": id,
        "tipo_de_inspeccion": "torre electrica",
        "version": 2,
        "periodicidad_dias": 30,
        "bloques": [
            {
                "n_orden": 0,
                "pregunta": {
                    "id": Uuid::new_v4(),
                    "titulo": "Inclinacion",
                    "criticidad": 2,
                    "tipo_de_pregunta": "numerica",
                    "criticidades_numericas": [
                        {"id": Uuid::new_v4(), "valor_minimo": 0.0, "valor_maximo": 90.0, "criticidad": 4}
                    ]
                }
            }
        ]
    });
    let (status, body) = send(
        &app,
        authed_request(
            "PUT",
            &format!("/api/cuestionarios/{}", id),
            PROFILE_A,
            Some(replacement),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);
    assert_eq!(body["bloques"].as_array().unwrap().len(), 1);

    // the old grid and its members are gone, only the new numeric remains
    let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(questions, 1);
    let options: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answer_options")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(options, 0);
}

#[tokio::test]
async fn questionnaires_are_tenant_scoped() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());

    let id = Uuid::new_v4();
    let (status, _) = send(
        &app,
        authed_request(
            "POST",
            "/api/cuestionarios",
            PROFILE_A,
            Some(grid_questionnaire(id, 1)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // another organization cannot see or delete it
    let (status, _) = send(
        &app,
        authed_request("GET", &format!("/api/cuestionarios/{}", id), PROFILE_B, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        authed_request("DELETE", &format!("/api/cuestionarios/{}", id), PROFILE_B, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        authed_request("GET", "/api/cuestionarios", PROFILE_B, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn id_collision_across_organizations_is_a_conflict() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());

    let id = Uuid::new_v4();
    let (status, _) = send(
        &app,
        authed_request(
            "POST",
            "/api/cuestionarios",
            PROFILE_A,
            Some(grid_questionnaire(id, 1)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // another organization cannot claim the id, by POST or by PUT
    let (status, body) = send(
        &app,
        authed_request(
            "POST",
            "/api/cuestionarios",
            PROFILE_B,
            Some(grid_questionnaire(id, 1)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = send(
        &app,
        authed_request(
            "PUT",
            &format!("/api/cuestionarios/{}", id),
            PROFILE_B,
            Some(grid_questionnaire(id, 1)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // and the questionnaire itself stays invisible
    let (status, _) = send(
        &app,
        authed_request("GET", &format!("/api/cuestionarios/{}", id), PROFILE_B, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_identity_header_is_unauthorized() {
    let db = setup_test_db().await;
    let media = tempfile::tempdir().unwrap();
    let app = setup_app(db, media.path());

    use tower::util::ServiceExt;
    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/cuestionarios")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // health stays public
    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

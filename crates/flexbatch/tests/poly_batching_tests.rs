//! Variable-size batching: item-supplied indices, rebasing and capacity.

use std::sync::Arc;

use flexbatch::{FlexBatch, Poly2, Polygon, WHITE_PACKED};
use flexbatch_test_utils::{
    logging, GpuCall, GpuLog, NullMesh, NullShader, NullStates, RecordingMesh, RecordingShader,
    RecordingStates,
};

fn triangle() -> Arc<Polygon> {
    Arc::new(Polygon::new(vec![0.0, 0.0, 4.0, 0.0, 4.0, 2.0], vec![0, 1, 2]).unwrap())
}

fn square() -> Arc<Polygon> {
    Arc::new(
        Polygon::new(vec![0.0, 0.0, 2.0, 0.0, 2.0, 2.0, 0.0, 2.0], vec![0, 1, 2, 2, 3, 0]).unwrap(),
    )
}

fn poly_batch(log: &GpuLog, max_vertices: usize, max_triangles: usize) -> FlexBatch<Poly2> {
    logging::init();
    FlexBatch::variable(
        Poly2::new(),
        max_vertices,
        max_triangles,
        Box::new(RecordingShader::new(log.clone())),
        Box::new(RecordingStates::new(log.clone())),
        |_| Box::new(RecordingMesh::new(log.clone())),
    )
    .unwrap()
}

fn null_poly_batch() -> FlexBatch<Poly2> {
    FlexBatch::variable(
        Poly2::new(),
        6,
        4,
        Box::new(NullShader),
        Box::new(NullStates),
        |_| Box::new(NullMesh),
    )
    .unwrap()
}

#[test]
fn indices_rebase_as_polygons_accumulate() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 100, 50);
    let mut second = Poly2::new();
    second.polygon(triangle()).position(10.0, 0.0);

    batch.begin();
    batch.draw().polygon(triangle());
    batch.draw_item(&second);
    batch.end();

    assert_eq!(log.last_indices().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(log.draws(), vec![(0, 6)]);
}

#[test]
fn every_uploaded_index_references_an_uploaded_vertex() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 7, 10);
    let stride = batch.stride();

    batch.begin();
    batch.draw().polygon(square());
    batch.draw().polygon(triangle()).position(5.0, 0.0);
    batch.draw().polygon(square()).position(10.0, 0.0);
    batch.end();

    assert_eq!(log.count_draws(), 2);
    let mut vertex_count = 0;
    for call in log.calls() {
        match call {
            GpuCall::SetVertices { vertices } => vertex_count = vertices.len() / stride,
            GpuCall::SetIndices { indices } => {
                assert!(indices.iter().all(|&index| (index as usize) < vertex_count));
            }
            _ => {}
        }
    }
}

#[test]
fn a_polygon_larger_than_the_remnant_forces_a_flush() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 6, 4);

    batch.begin();
    batch.draw().polygon(square());
    batch.draw().polygon(triangle());
    batch.end();

    // Two vertex slots remain after the square; the triangle needs three.
    assert_eq!(log.draws(), vec![(0, 6), (0, 3)]);
}

#[test]
fn a_full_index_buffer_forces_a_flush() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 100, 2);

    batch.begin();
    batch.draw().polygon(square());
    batch.draw().polygon(triangle());
    batch.end();

    assert_eq!(log.draws(), vec![(0, 6), (0, 3)]);
}

#[test]
fn vertex_content_flows_through_resolved_offsets() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 100, 50);
    let mut item = Poly2::new();
    item.polygon(triangle());

    batch.begin();
    batch.draw_item(&item);
    batch.end();

    let w = WHITE_PACKED;
    // x, y, packed color, then bounds-mapped UVs with v pointing down.
    #[rustfmt::skip]
    let expected = vec![
        0.0, 0.0, w, 0.0, 1.0,
        4.0, 0.0, w, 1.0, 1.0,
        4.0, 2.0, w, 1.0, 0.0,
    ];
    assert_eq!(log.last_vertices().unwrap(), expected);
}

#[test]
fn raw_indexed_data_lands_rebased_after_queued_content() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 6, 4);
    let data: Vec<f32> = (0..15).map(|i| i as f32).collect();

    batch.begin();
    batch.draw().polygon(triangle());
    batch.draw_raw_indexed(&Poly2::new(), &data, 5, &[0, 1, 2]);
    batch.end();

    assert_eq!(log.draws(), vec![(0, 6)]);
    assert_eq!(log.last_indices().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(&log.last_vertices().unwrap()[15..30], &data[..]);
}

#[test]
fn raw_indexed_data_flushes_first_when_it_does_not_fit() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 6, 4);
    let data = [0.0f32; 15];

    batch.begin();
    batch.draw().polygon(square());
    batch.draw_raw_indexed(&Poly2::new(), &data, 5, &[0, 1, 2]);
    batch.end();

    assert_eq!(log.draws(), vec![(0, 6), (0, 3)]);
    assert_eq!(log.last_indices().unwrap(), vec![0, 1, 2]);
}

#[test]
fn narrow_raw_vertices_keep_stale_slot_tails() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 6, 4);

    batch.begin();
    batch.draw().polygon(triangle());
    batch.flush();
    let first = log.last_vertices().unwrap();

    batch.draw_raw_indexed(&Poly2::new(), &[9.0, 9.0, 8.0, 8.0, 7.0, 7.0], 2, &[0, 1, 2]);
    batch.end();
    let second = log.last_vertices().unwrap();

    assert_eq!(&second[0..2], &[9.0, 9.0]);
    assert_eq!(&second[2..5], &first[2..5]);
    assert_eq!(&second[5..7], &[8.0, 8.0]);
    assert_eq!(&second[7..10], &first[7..10]);
    assert_eq!(&second[10..12], &[7.0, 7.0]);
    assert_eq!(&second[12..15], &first[12..15]);
}

#[test]
fn an_unset_polygon_contributes_nothing() {
    let log = GpuLog::new();
    let mut batch = poly_batch(&log, 100, 50);

    batch.begin();
    batch.draw();
    batch.end();

    assert_eq!(log.count_draws(), 0);
    assert_eq!(batch.render_calls(), 0);
}

#[test]
#[should_panic(expected = "exceeds the batch capacity")]
fn a_polygon_larger_than_the_whole_batch_panics() {
    let mut batch = null_poly_batch();
    // Seven fan vertices against a six-vertex batch: no flush can make room.
    let fan = Arc::new(
        Polygon::new(
            vec![0.0, 0.0, 2.0, 0.0, 3.0, 1.0, 3.0, 2.0, 2.0, 3.0, 0.0, 3.0, -1.0, 1.0],
            vec![0, 1, 2, 0, 2, 3, 0, 3, 4, 0, 4, 5, 0, 5, 6],
        )
        .unwrap(),
    );
    let mut item = Poly2::new();
    item.polygon(fan);

    batch.begin();
    batch.draw_item(&item);
}

#[test]
#[should_panic(expected = "raw vertex submission requires a fixed-size batch")]
fn unindexed_raw_submission_panics_on_a_variable_batch() {
    let mut batch = null_poly_batch();
    batch.begin();
    batch.draw_raw(&Poly2::new(), &[0.0; 10], 5);
}

#[test]
#[should_panic(expected = "exceeds batch capacity")]
fn an_oversized_raw_indexed_submission_panics() {
    let mut batch = null_poly_batch();
    batch.begin();
    batch.draw_raw_indexed(&Poly2::new(), &[0.0; 35], 5, &[0, 1, 2]);
}

#[test]
#[should_panic(expected = "exceeds the batch stride")]
fn a_source_stride_wider_than_the_batch_panics() {
    let mut batch = null_poly_batch();
    batch.begin();
    batch.draw_raw_indexed(&Poly2::new(), &[0.0; 12], 6, &[0, 1, 2]);
}

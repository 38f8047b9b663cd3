//! End-to-end scenarios: local writes, dirty and fallback reads, peer
//! replay, block reconciliation and graceful shutdown.

mod common;
use common::*;

#[test]
fn single_write_is_pooled_and_committed() {
    let (_dir, _storage, state) = setup_with_table(100);

    let req = write_req("INSERT INTO t VALUES (1)");
    let (_tracker, resp) = state.query(&req).expect("write");
    assert_eq!(resp.header.log_offset, LogOffset(100));
    assert_eq!(state.head_offset(), LogOffset(101));
    assert_eq!(state.pooled_offsets(), vec![LogOffset(100)]);

    let (failed, applied) = state.commit_ex().expect("commit ex");
    assert!(failed.is_empty());
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].req.digest(), req.digest());
    assert_eq!(state.head_offset(), LogOffset(101));
    assert_eq!(state.stat(&db()).trackers, 0);
}

#[test]
fn dirty_read_does_not_see_uncommitted_write() {
    let (_dir, _storage, state) = setup_with_table(100);

    let (_t, wresp) = state.query(&write_req("INSERT INTO t VALUES (1)")).expect("write");
    assert_eq!(wresp.header.log_offset, LogOffset(100));

    let (_t, rresp) = state.query(&read_req("SELECT count(*) FROM t")).expect("read");
    assert_eq!(rresp.header.log_offset, LogOffset(101));
    assert_eq!(rresp.header.row_count, 1);
    assert_eq!(single_cell(&rresp), &SqlValue::Integer(0), "insert is uncommitted");
    assert!(!state.has_schema_change());
}

#[test]
fn ddl_write_routes_reads_through_the_transaction() {
    let (_dir, _storage, state) = setup(100);

    let (_t, wresp) = state.query(&write_req("CREATE TABLE t (x INTEGER)")).expect("ddl");
    assert_eq!(wresp.header.log_offset, LogOffset(100));
    assert!(state.has_schema_change());

    // The table only exists inside the open transaction; the fallback
    // path still has to serve the read.
    let (_t, rresp) = state.query(&read_req("SELECT count(*) FROM t")).expect("read");
    assert_eq!(rresp.header.log_offset, LogOffset(101));
    assert_eq!(single_cell(&rresp), &SqlValue::Integer(0));
}

#[test]
fn replay_ahead_of_local_state_reports_missing_parent() {
    let (_dir_a, _sa, state_a) = setup_with_table(100);
    let (_dir_b, _sb, state_b) = setup_with_table(100);

    let req = write_req("INSERT INTO t VALUES (1)");
    let (_t, resp) = state_a.query(&req).expect("write");
    let mut ahead = resp.clone();
    ahead.header.log_offset = LogOffset(105);

    let err = state_b.replay(&req, &ahead).unwrap_err();
    assert!(matches!(err, StateError::MissingParent { .. }));
    assert_eq!(state_b.head_offset(), LogOffset(100));
    assert!(state_b.pooled_offsets().is_empty());
}

#[test]
fn block_matching_the_pool_commits_the_transaction() {
    let (_dir, storage, state) = setup_with_table(100);

    let req1 = write_req("INSERT INTO t VALUES (1)");
    let req2 = write_req("INSERT INTO t VALUES (2)");
    let (_t, resp1) = state.query(&req1).expect("w1");
    let (_t, resp2) = state.query(&req2).expect("w2");

    state
        .replay_block(&block_of(&[(&req1, &resp1), (&req2, &resp2)]))
        .expect("replay block");

    assert_eq!(state.head_offset(), LogOffset(102));
    assert_eq!(state.origin_offset(), LogOffset(102));
    assert_eq!(state.commit_point(), LogOffset(102));
    assert!(state.pooled_offsets().is_empty());
    assert!(!state.has_schema_change());

    // The commit made both rows visible to dirty readers.
    let reader = storage.begin_dirty_read().expect("dirty read");
    let out = reader.query("SELECT count(*) FROM t", &[]).expect("count");
    assert_eq!(out.rows[0][0], SqlValue::Integer(2));
}

#[test]
fn block_with_extra_local_tail_defers_the_commit() {
    let (_dir, _storage, state) = setup_with_table(100);

    let req1 = write_req("INSERT INTO t VALUES (1)");
    let req2 = write_req("INSERT INTO t VALUES (2)");
    let req3 = write_req("INSERT INTO t VALUES (3)");
    let (_t, resp1) = state.query(&req1).expect("w1");
    let (_t, resp2) = state.query(&req2).expect("w2");
    state.query(&req3).expect("w3");

    state
        .replay_block(&block_of(&[(&req1, &resp1), (&req2, &resp2)]))
        .expect("replay block");

    // Not committed: the tail write at 102 is a candidate for the next
    // block and the commit point marks its savepoint.
    assert_eq!(state.head_offset(), LogOffset(103));
    assert_eq!(state.commit_point(), LogOffset(102));
    assert_eq!(state.pooled_offsets(), vec![LogOffset(102)]);
}

#[test]
fn block_conflicting_with_the_pool_is_rejected() {
    let (_dir_a, _sa, state_a) = setup_with_table(100);
    let (_dir_b, _sb, state_b) = setup_with_table(100);

    let req_a = write_req("INSERT INTO t VALUES (1)");
    let (_t, resp_a) = state_a.query(&req_a).expect("local write");

    // A different request claims the same offset.
    let req_b = write_req("INSERT INTO t VALUES (999)");
    let (_t, resp_b) = state_b.query(&req_b).expect("peer write");

    let err = state_a.replay_block(&block_of(&[(&req_b, &resp_b)])).unwrap_err();
    assert!(matches!(err, StateError::QueryConflict { .. }));
    assert_eq!(state_a.pooled_offsets(), vec![LogOffset(100)]);
    assert_eq!(state_a.commit_point(), LogOffset(100));
}

#[test]
fn follower_replays_a_whole_block_and_commits() {
    let (_dir_a, _sa, state_a) = setup_with_table(100);
    let (_dir_b, storage_b, state_b) = setup_with_table(100);

    let req1 = write_req("INSERT INTO t VALUES (1)");
    let req2 = write_req("INSERT INTO t VALUES (2)");
    let (_t, resp1) = state_a.query(&req1).expect("w1");
    let (_t, resp2) = state_a.query(&req2).expect("w2");

    // The follower never saw the writes; the block carries them.
    state_b
        .replay_block(&block_of(&[(&req1, &resp1), (&req2, &resp2)]))
        .expect("follower replay");

    assert_eq!(state_b.head_offset(), LogOffset(102));
    assert!(state_b.pooled_offsets().is_empty());
    let reader = storage_b.begin_dirty_read().expect("dirty read");
    let out = reader.query("SELECT count(*) FROM t", &[]).expect("count");
    assert_eq!(out.rows[0][0], SqlValue::Integer(2));
}

#[test]
fn block_purges_reported_failed_requests() {
    let (_dir, _storage, state) = setup_with_table(100);

    let bad = write_req("INSERT INTO missing VALUES (1)");
    assert!(state.query(&bad).is_err());
    assert_eq!(state.stat(&db()).failed, 1);

    let block = Block {
        query_txs: vec![],
        failed_reqs: vec![bad],
    };
    state.replay_block(&block).expect("empty block");
    assert_eq!(state.stat(&db()).failed, 0);
    // No finalization happened.
    assert_eq!(state.commit_point(), LogOffset(100));
}

#[test]
fn close_without_commit_persists_only_finalized_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("osprey.db");
    {
        let storage = Arc::new(
            SqliteStorage::open(&path, &StorageConfig::default()).expect("open storage"),
        );
        let tx = storage.begin_write().expect("begin");
        tx.exec("CREATE TABLE t (v INTEGER)", &[]).expect("create");
        tx.commit().expect("commit");

        let mut state =
            State::new(NodeId(1), Arc::clone(&storage), StateConfig::default()).expect("state");
        state.init_tx(LogOffset(100)).expect("init");

        let req1 = write_req("INSERT INTO t VALUES (1)");
        let req2 = write_req("INSERT INTO t VALUES (2)");
        let req3 = write_req("INSERT INTO t VALUES (3)");
        let (_t, resp1) = state.query(&req1).expect("w1");
        let (_t, resp2) = state.query(&req2).expect("w2");
        state.query(&req3).expect("w3");
        state
            .replay_block(&block_of(&[(&req1, &resp1), (&req2, &resp2)]))
            .expect("partial finalization");

        // Discards the unfinalized tail write at 102, keeps 100 and 101.
        state.close(false).expect("close");
    }

    let storage = Arc::new(SqliteStorage::open(&path, &StorageConfig::default()).expect("reopen"));
    let reader = storage.begin_dirty_read().expect("read");
    let out = reader.query("SELECT v FROM t ORDER BY v", &[]).expect("select");
    assert_eq!(
        out.rows,
        vec![vec![SqlValue::Integer(1)], vec![SqlValue::Integer(2)]]
    );
}

#[test]
fn readers_run_while_the_writer_holds_the_lock() {
    let (_dir, _storage, state) = setup_with_table(100);
    let state = Arc::new(state);

    std::thread::scope(|scope| {
        let writer = {
            let state = Arc::clone(&state);
            scope.spawn(move || {
                for n in 0..50 {
                    let sql = format!("INSERT INTO t VALUES ({n})");
                    state.query(&write_req(&sql)).expect("write");
                }
            })
        };
        for _ in 0..50 {
            let (_t, resp) = state.query(&read_req("SELECT count(*) FROM t")).expect("read");
            // Dirty reads never observe the open transaction.
            assert_eq!(single_cell(&resp), &SqlValue::Integer(0));
        }
        writer.join().expect("writer thread");
    });

    assert_eq!(state.head_offset(), LogOffset(150));
    assert_eq!(state.pooled_offsets().len(), 50);
}

#[test]
fn errors_funnel_into_the_top_level_kind() -> OspreyResult<()> {
    let (_dir, storage, state) = setup_with_table(100);

    state.query(&write_req("INSERT INTO t VALUES (1)"))?;
    let reader = storage.begin_dirty_read()?;
    let out = reader.query("SELECT count(*) FROM t", &[])?;
    assert_eq!(out.rows[0][0], SqlValue::Integer(0));
    state.close(true)?;
    Ok(())
}

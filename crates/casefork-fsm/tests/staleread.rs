//! Offline stale-read FSM: an abstract model of a SQL session mixing
//! transactions, staleness system variables, and prepared statements.
//!
//! This is the kind of consumer the FSM layer exists for: a state of small
//! flags, guards derived from those flags, effects that advance the abstract
//! state, and a signature folding the next action's name. The enumeration is
//! checked for replay fidelity and for exact first-visit transition coverage
//! against a brute-force breadth-first oracle.

use casefork_core::{Cond, ForkContext, ForkError, ForkIter, ForkResult, Forker, GenerateContext, GenerationForker};
use casefork_fsm::{FsmEffect, FsmForker, FsmForkerBuilder, FsmState};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Env {
    autocommit: bool,
    rc: bool,
    use_variable: bool,
    pessimistic: bool,
}

impl Env {
    fn tag(&self) -> String {
        format!(
            "autocommit={}&rc={}&useVariable={}&pessimistic={}",
            self.autocommit, self.rc, self.use_variable, self.pessimistic
        )
    }
}

#[derive(Clone, Debug, Default)]
struct StaleRead {
    env: Option<Env>,
    in_txn: bool,
    txn_stale: bool,
    sys_var_tx_read_ts: bool,
    sys_var_read_staleness: bool,
    stmt_prepared: bool,
    binary_prepare: bool,
    prepared_stale: bool,
}

impl FsmState for StaleRead {
    fn signature(&self, next_action: &str) -> String {
        format!(
            "env={},t={},s={},v={},r={},p={},b={},ps={}->{}",
            self.env.as_ref().map(Env::tag).unwrap_or_default(),
            self.in_txn as u8,
            self.txn_stale as u8,
            self.sys_var_tx_read_ts as u8,
            self.sys_var_read_staleness as u8,
            self.stmt_prepared as u8,
            self.binary_prepare as u8,
            self.prepared_stale as u8,
            next_action
        )
    }
}

#[derive(Clone, Copy)]
enum SysVar {
    TxReadTs,
    ReadStaleness,
}

fn env_of(state: &StaleRead) -> ForkResult<&Env> {
    state
        .env
        .as_ref()
        .ok_or_else(|| ForkError::callback("environment not initialized"))
}

/// A plain or prepared-statement read. A read inside a non-autocommit
/// session opens a transaction implicitly unless it would be stale or fail.
fn do_query(state: &mut StaleRead, execute_prepared: bool, select_as_of: bool) -> ForkResult<()> {
    let autocommit = env_of(state)?.autocommit;
    let select_as_of = select_as_of || (execute_prepared && state.prepared_stale);
    let will_success = state.in_txn && !(state.sys_var_tx_read_ts || select_as_of)
        || !state.in_txn && !(state.sys_var_tx_read_ts && select_as_of);
    let will_stale = select_as_of
        || (state.in_txn && state.txn_stale)
        || (!state.in_txn && (state.sys_var_tx_read_ts || state.sys_var_read_staleness));

    if !autocommit && !state.in_txn && !will_stale && will_success {
        state.in_txn = true;
        state.txn_stale = false;
        state.sys_var_tx_read_ts = false;
    }
    Ok(())
}

fn do_prepare(state: &mut StaleRead, binary: bool, as_of: bool) -> ForkResult<()> {
    env_of(state)?;
    let will_stale = !state.in_txn
        && (as_of || state.sys_var_tx_read_ts || state.sys_var_read_staleness);
    let will_success = (state.in_txn && !(as_of || state.sys_var_tx_read_ts))
        || (!state.in_txn && !(as_of && state.sys_var_tx_read_ts));

    if will_success {
        state.stmt_prepared = true;
        state.binary_prepare = binary;
        state.prepared_stale = will_stale;
        state.sys_var_tx_read_ts = false;
    }
    Ok(())
}

fn start_txn(state: &mut StaleRead, as_of: bool) -> ForkResult<()> {
    env_of(state)?;
    let will_success = !(state.sys_var_tx_read_ts && as_of);
    let will_stale = as_of || state.sys_var_tx_read_ts;
    if will_success {
        state.in_txn = true;
        state.txn_stale = will_stale;
        state.sys_var_tx_read_ts = false;
    }
    Ok(())
}

fn close_txn(state: &mut StaleRead) -> ForkResult<()> {
    env_of(state)?;
    state.in_txn = false;
    state.txn_stale = false;
    Ok(())
}

/// Setting tx_read_ts inside a transaction fails on the real server; the
/// abstract state is left untouched in that case.
fn set_sys_var(state: &mut StaleRead, var: SysVar, clear: bool) -> ForkResult<()> {
    env_of(state)?;
    let will_success = !(state.in_txn && matches!(var, SysVar::TxReadTs));
    if will_success {
        match var {
            SysVar::TxReadTs => state.sys_var_tx_read_ts = !clear,
            SysVar::ReadStaleness => state.sys_var_read_staleness = !clear,
        }
    }
    Ok(())
}

fn initializing() -> Cond<StaleRead> {
    Cond::pred(|s: &StaleRead| s.env.is_none())
}

fn initialized() -> Cond<StaleRead> {
    Cond::pred(|s: &StaleRead| s.env.is_some())
}

fn prepared() -> Cond<StaleRead> {
    Cond::pred(|s: &StaleRead| s.stmt_prepared)
}

fn build_forker() -> FsmForker<StaleRead> {
    let init_seeds = GenerationForker::new(|g: &mut GenerateContext<'_>| {
        let env = Env {
            rc: g.pick_enum(true, [false])?,
            autocommit: g.pick_enum(true, [false])?,
            use_variable: false,
            pessimistic: false,
        };
        let name = format!("init_env-{}", env.tag());
        let effect: FsmEffect<StaleRead> = Rc::new(move |_ctx, state: &mut StaleRead| {
            state.env = Some(env.clone());
            Ok(())
        });
        Ok((name, effect))
    });

    FsmForkerBuilder::new(|| Ok(StaleRead::default()))
        .when(initializing())
        .fork_action(&init_seeds)
        .end_when()
        .when(initialized())
        .action("start_txn", |_ctx, s| start_txn(s, false))
        .action("start_txn_as_of", |_ctx, s| start_txn(s, true))
        .action("close_txn", |_ctx, s| close_txn(s))
        .end_when()
        .when(initialized())
        .action("set_tx_read_ts", |_ctx, s| {
            set_sys_var(s, SysVar::TxReadTs, false)
        })
        .action("clear_tx_read_ts", |_ctx, s| {
            set_sys_var(s, SysVar::TxReadTs, true)
        })
        .action("set_read_staleness", |_ctx, s| {
            set_sys_var(s, SysVar::ReadStaleness, false)
        })
        .action("clear_read_staleness", |_ctx, s| {
            set_sys_var(s, SysVar::ReadStaleness, true)
        })
        .end_when()
        .when(initialized())
        .action("select_normal", |_ctx, s| do_query(s, false, false))
        .action("select_as_of", |_ctx, s| do_query(s, false, true))
        .end_when()
        .when(initialized())
        .action("sql_prepare", |_ctx, s| do_prepare(s, false, false))
        .action("binary_prepare", |_ctx, s| do_prepare(s, true, false))
        .action("sql_prepare_as_of", |_ctx, s| do_prepare(s, false, true))
        .action("binary_prepare_as_of", |_ctx, s| do_prepare(s, true, true))
        .end_when()
        .when(Cond::and(initialized(), [prepared()]))
        .action("execute", |_ctx, s| do_query(s, true, false))
        .end_when()
        .build()
        .unwrap()
}

/// Brute-force oracle: breadth-first reachability over signature classes,
/// collecting every `(class, enabled action)` key.
fn expected_transitions(forker: &FsmForker<StaleRead>) -> HashSet<String> {
    let ctx = ForkContext::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<StaleRead> = VecDeque::new();
    let mut expected = HashSet::new();

    let initial = forker.initial_state().unwrap();
    seen.insert(initial.signature(""));
    queue.push_back(initial);

    while let Some(state) = queue.pop_front() {
        for action in forker.actions() {
            if !action.condition().evaluate(&state).unwrap() {
                continue;
            }
            expected.insert(state.signature(action.name()));

            let mut next = state.clone();
            action.apply(&ctx, &mut next).unwrap();
            if seen.insert(next.signature("")) {
                queue.push_back(next);
            }
        }
    }
    expected
}

#[test]
fn enumeration_covers_exactly_the_reachable_transitions() {
    let forker = build_forker();
    let ctx = ForkContext::new();
    let mut iter = forker.do_fork(&ctx).unwrap();

    let mut records = HashSet::new();
    let mut cases = 0usize;
    while iter.valid() {
        let result = iter.value().expect("emitted case");

        // Replay fidelity: the path reproduces the final signature from a
        // fresh initial state.
        let mut state = forker.initial_state().unwrap();
        for action in result.path() {
            records.insert(state.signature(action.name()));
            action.apply(&ctx, &mut state).unwrap();
        }
        assert_eq!(state.signature(""), result.final_state().signature(""));

        cases += 1;
        iter.next().unwrap();
    }

    let expected = expected_transitions(&forker);
    assert_eq!(expected, records);
    assert!(cases > expected.len(), "one case per transition plus stops");
}

#[test]
fn enumeration_is_deterministic_across_forks() {
    let forker = build_forker();
    let ctx = ForkContext::new();

    let head_paths = |forker: &FsmForker<StaleRead>| -> Vec<Vec<String>> {
        let mut iter = forker.do_fork(&ctx).unwrap();
        let mut out = Vec::new();
        while iter.valid() && out.len() < 50 {
            let result = iter.value().unwrap();
            out.push(result.path().iter().map(|a| a.name().to_string()).collect());
            iter.next().unwrap();
        }
        iter.close();
        out
    };

    assert_eq!(head_paths(&forker), head_paths(&forker));
}

#[test]
fn abstract_transitions_follow_the_session_rules() {
    let env = Env {
        autocommit: true,
        rc: false,
        use_variable: false,
        pessimistic: false,
    };
    let mut state = StaleRead {
        env: Some(env),
        ..StaleRead::default()
    };

    // A stale transaction start marks the session stale and consumes
    // tx_read_ts.
    set_sys_var(&mut state, SysVar::TxReadTs, false).unwrap();
    start_txn(&mut state, false).unwrap();
    assert!(state.in_txn);
    assert!(state.txn_stale);
    assert!(!state.sys_var_tx_read_ts);

    // Setting tx_read_ts inside a transaction is rejected by the server and
    // leaves the abstract state unchanged.
    set_sys_var(&mut state, SysVar::TxReadTs, false).unwrap();
    assert!(!state.sys_var_tx_read_ts);

    close_txn(&mut state).unwrap();
    assert!(!state.in_txn);
    assert!(!state.txn_stale);

    // A stale prepare outside a transaction records a stale statement.
    do_prepare(&mut state, true, true).unwrap();
    assert!(state.stmt_prepared);
    assert!(state.binary_prepare);
    assert!(state.prepared_stale);

    // Executing the stale statement counts as a stale read and never opens
    // an implicit transaction.
    do_query(&mut state, true, false).unwrap();
    assert!(!state.in_txn);
}

#[test]
fn implicit_transaction_opens_on_fresh_read_without_autocommit() {
    let env = Env {
        autocommit: false,
        rc: false,
        use_variable: false,
        pessimistic: false,
    };
    let mut state = StaleRead {
        env: Some(env),
        ..StaleRead::default()
    };

    do_query(&mut state, false, false).unwrap();
    assert!(state.in_txn);
    assert!(!state.txn_stale);

    // A stale read does not open one.
    let mut stale = StaleRead {
        env: state.env.clone(),
        sys_var_read_staleness: true,
        ..StaleRead::default()
    };
    do_query(&mut stale, false, false).unwrap();
    assert!(!stale.in_txn);
}

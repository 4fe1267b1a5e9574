//! ledger.rs
//!
//! SeatLedger — единственный источник истины о статусе мест показа.
//! Все операции проверки-и-перехода выполняются под мьютексом показа,
//! поэтому проверка «все места свободны» и переход в HELD видны снаружи
//! как один атомарный шаг. Внутри критической секции нет await-точек:
//! платёжный шлюз вызывается сервисом строго между try_claim и
//! commit/release.
//!
//! Машина состояний места:
//! AVAILABLE -> HELD -> BOOKED -> AVAILABLE (отмена),
//! плюс HELD -> AVAILABLE (release или истечение удержания).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TicketError};
use crate::models::{SeatId, SeatStatus, Show, ShowId};

/// Одноразовое подтверждение удержания конкретного набора мест.
/// Не клонируется; commit/release забирают токен по значению, так что
/// повторное использование не выражается в типах. Просроченный или уже
/// погашенный токен ледгер отклоняет как `InvalidToken`.
#[derive(Debug)]
pub struct ClaimToken {
    id: Uuid,
    show_id: ShowId,
    seat_ids: Vec<SeatId>,
}

impl ClaimToken {
    pub fn show_id(&self) -> ShowId {
        self.show_id
    }

    pub fn seat_ids(&self) -> &[SeatId] {
        &self.seat_ids
    }
}

struct Hold {
    seat_ids: Vec<SeatId>,
    expires_at: Instant,
}

#[derive(Default)]
struct ShowSeats {
    seats: BTreeMap<SeatId, SeatStatus>,
    holds: HashMap<Uuid, Hold>,
}

impl ShowSeats {
    /// Снимает все просроченные удержания, возвращая места в AVAILABLE.
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<Uuid> = self
            .holds
            .iter()
            .filter(|(_, hold)| hold.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();

        for hold_id in &expired {
            if let Some(hold) = self.holds.remove(hold_id) {
                for seat_id in hold.seat_ids {
                    self.seats.insert(seat_id, SeatStatus::Available);
                }
            }
        }
        expired.len()
    }

    /// Идентификаторы из запроса, не принадлежащие показу.
    fn unknown_seats(&self, seat_ids: &BTreeSet<SeatId>) -> Vec<SeatId> {
        seat_ids
            .iter()
            .copied()
            .filter(|id| !self.seats.contains_key(id))
            .collect()
    }
}

pub struct SeatLedger {
    shows: RwLock<HashMap<ShowId, Arc<Mutex<ShowSeats>>>>,
    hold_ttl: Duration,
}

impl SeatLedger {
    pub fn new(hold_ttl: Duration) -> Self {
        Self {
            shows: RwLock::new(HashMap::new()),
            hold_ttl,
        }
    }

    /// Регистрирует показ: каждое место стартует в AVAILABLE.
    /// Набор мест показа после этого фиксирован.
    pub fn register_show(&self, show: &Show) -> Result<()> {
        let mut shows = self.shows.write().unwrap();
        if shows.contains_key(&show.id) {
            return Err(TicketError::InvalidInput(format!(
                "показ {} уже есть в ледгере",
                show.id
            )));
        }
        let seats: BTreeMap<SeatId, SeatStatus> = show
            .seats()
            .iter()
            .map(|seat| (seat.id, SeatStatus::Available))
            .collect();
        shows.insert(
            show.id,
            Arc::new(Mutex::new(ShowSeats {
                seats,
                holds: HashMap::new(),
            })),
        );
        Ok(())
    }

    fn show_state(&self, show_id: ShowId) -> Result<Arc<Mutex<ShowSeats>>> {
        self.shows
            .read()
            .unwrap()
            .get(&show_id)
            .cloned()
            .ok_or_else(|| {
                TicketError::InvalidInput(format!("показ {} не зарегистрирован", show_id))
            })
    }

    /// Атомарно удерживает весь набор мест по принципу «всё или ничего».
    /// Если хоть одно место занято, состояние не меняется и вызывающий
    /// получает точный список конфликтных мест.
    pub fn try_claim(&self, show_id: ShowId, seat_ids: &[SeatId]) -> Result<ClaimToken> {
        let requested: BTreeSet<SeatId> = seat_ids.iter().copied().collect();
        if requested.is_empty() {
            return Err(TicketError::InvalidInput(
                "пустой набор мест".to_string(),
            ));
        }

        let state = self.show_state(show_id)?;
        let mut state = state.lock().unwrap();
        state.purge_expired(Instant::now());

        let unknown = state.unknown_seats(&requested);
        if !unknown.is_empty() {
            return Err(TicketError::InvalidInput(format!(
                "места {:?} не принадлежат показу {}",
                unknown, show_id
            )));
        }

        let busy: Vec<SeatId> = requested
            .iter()
            .copied()
            .filter(|id| state.seats.get(id) != Some(&SeatStatus::Available))
            .collect();
        if !busy.is_empty() {
            return Err(TicketError::SeatUnavailable { seat_ids: busy });
        }

        let token = ClaimToken {
            id: Uuid::new_v4(),
            show_id,
            seat_ids: requested.iter().copied().collect(),
        };
        for &seat_id in &token.seat_ids {
            state.seats.insert(seat_id, SeatStatus::Held);
        }
        state.holds.insert(
            token.id,
            Hold {
                seat_ids: token.seat_ids.clone(),
                expires_at: Instant::now() + self.hold_ttl,
            },
        );
        debug!(show_id, seats = ?token.seat_ids, "seats held");
        Ok(token)
    }

    /// HELD -> BOOKED для всего набора токена. Токен гасится.
    pub fn commit(&self, token: ClaimToken) -> Result<()> {
        self.consume_hold(token, SeatStatus::Booked)
    }

    /// HELD -> AVAILABLE для всего набора токена. Токен гасится.
    pub fn release(&self, token: ClaimToken) -> Result<()> {
        self.consume_hold(token, SeatStatus::Available)
    }

    fn consume_hold(&self, token: ClaimToken, next: SeatStatus) -> Result<()> {
        let state = self.show_state(token.show_id)?;
        let mut state = state.lock().unwrap();
        state.purge_expired(Instant::now());

        // Просроченное удержание уже снято purge'ем — токен недействителен.
        if !state.holds.contains_key(&token.id) {
            return Err(TicketError::InvalidToken);
        }

        // Сначала проверяем все переходы, мутируем только потом.
        for &seat_id in &token.seat_ids {
            match state.seats.get(&seat_id) {
                Some(SeatStatus::Held) => {}
                Some(status) => {
                    return Err(TicketError::InvalidTransition(format!(
                        "место {} в статусе {}, ожидался HELD",
                        seat_id, status
                    )));
                }
                None => return Err(TicketError::InvalidToken),
            }
        }

        state.holds.remove(&token.id);
        for &seat_id in &token.seat_ids {
            state.seats.insert(seat_id, next);
        }
        debug!(show_id = token.show_id, seats = ?token.seat_ids, %next, "hold consumed");
        Ok(())
    }

    /// BOOKED -> AVAILABLE при отмене подтверждённого бронирования.
    /// Если хоть одно место не в BOOKED, ничего не меняется.
    pub fn cancel_booked(&self, show_id: ShowId, seat_ids: &[SeatId]) -> Result<()> {
        let requested: BTreeSet<SeatId> = seat_ids.iter().copied().collect();
        if requested.is_empty() {
            return Err(TicketError::InvalidInput(
                "пустой набор мест".to_string(),
            ));
        }

        let state = self.show_state(show_id)?;
        let mut state = state.lock().unwrap();
        state.purge_expired(Instant::now());

        let unknown = state.unknown_seats(&requested);
        if !unknown.is_empty() {
            return Err(TicketError::InvalidInput(format!(
                "места {:?} не принадлежат показу {}",
                unknown, show_id
            )));
        }

        let not_booked: Vec<SeatId> = requested
            .iter()
            .copied()
            .filter(|id| state.seats.get(id) != Some(&SeatStatus::Booked))
            .collect();
        if !not_booked.is_empty() {
            return Err(TicketError::NotBooked {
                seat_ids: not_booked,
            });
        }

        for seat_id in requested {
            state.seats.insert(seat_id, SeatStatus::Available);
        }
        Ok(())
    }

    /// Консистентный снимок статусов: берётся под мьютексом показа,
    /// так что «рваное» промежуточное состояние наблюдать нельзя.
    pub fn snapshot(&self, show_id: ShowId) -> Result<BTreeMap<SeatId, SeatStatus>> {
        let state = self.show_state(show_id)?;
        let mut state = state.lock().unwrap();
        state.purge_expired(Instant::now());
        Ok(state.seats.clone())
    }

    /// Снимает просроченные удержания по всем показам.
    /// Вызывается фоновым процессом; возвращает число снятых удержаний.
    pub fn sweep_expired(&self) -> usize {
        let states: Vec<Arc<Mutex<ShowSeats>>> =
            self.shows.read().unwrap().values().cloned().collect();

        let now = Instant::now();
        states
            .iter()
            .map(|state| state.lock().unwrap().purge_expired(now))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Seat, SeatCategory};
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::sync::Barrier;
    use std::thread;

    const SHOW: ShowId = 1;

    fn ledger_with_seats(count: i64, hold_ttl: Duration) -> SeatLedger {
        let day = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let seats = (1..=count)
            .map(|id| Seat::new(id, 1, id as i32, SeatCategory::standard()))
            .collect();
        let show = Show::new(
            SHOW,
            day.and_hms_opt(10, 0, 0).unwrap(),
            day.and_hms_opt(12, 0, 0).unwrap(),
            seats,
        )
        .unwrap();

        let ledger = SeatLedger::new(hold_ttl);
        ledger.register_show(&show).unwrap();
        ledger
    }

    fn default_ledger(count: i64) -> SeatLedger {
        ledger_with_seats(count, Duration::from_secs(300))
    }

    #[test]
    fn claim_commit_books_all_seats() {
        let ledger = default_ledger(3);
        let token = ledger.try_claim(SHOW, &[1, 2]).unwrap();
        ledger.commit(token).unwrap();

        let snapshot = ledger.snapshot(SHOW).unwrap();
        assert_eq!(snapshot[&1], SeatStatus::Booked);
        assert_eq!(snapshot[&2], SeatStatus::Booked);
        assert_eq!(snapshot[&3], SeatStatus::Available);
    }

    #[test]
    fn overlapping_claim_reports_exact_conflict() {
        let ledger = default_ledger(3);
        let _held = ledger.try_claim(SHOW, &[1, 2]).unwrap();

        let err = ledger.try_claim(SHOW, &[2, 3]).unwrap_err();
        assert_eq!(
            err,
            TicketError::SeatUnavailable { seat_ids: vec![2] }
        );
        // Всё или ничего: место 3 не тронуто проигравшей заявкой.
        assert_eq!(ledger.snapshot(SHOW).unwrap()[&3], SeatStatus::Available);
    }

    #[test]
    fn claim_rejects_foreign_and_empty_sets() {
        let ledger = default_ledger(2);
        assert!(matches!(
            ledger.try_claim(SHOW, &[]),
            Err(TicketError::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.try_claim(SHOW, &[1, 99]),
            Err(TicketError::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.try_claim(42, &[1]),
            Err(TicketError::InvalidInput(_))
        ));
        // Неудачные заявки ничего не удерживают.
        assert_eq!(ledger.snapshot(SHOW).unwrap()[&1], SeatStatus::Available);
    }

    #[test]
    fn release_returns_seats_to_available() {
        let ledger = default_ledger(2);
        let token = ledger.try_claim(SHOW, &[1, 2]).unwrap();
        ledger.release(token).unwrap();

        let snapshot = ledger.snapshot(SHOW).unwrap();
        assert!(snapshot.values().all(|s| *s == SeatStatus::Available));
        assert!(ledger.try_claim(SHOW, &[1, 2]).is_ok());
    }

    #[test]
    fn cancel_booked_round_trip() {
        let ledger = default_ledger(2);
        let token = ledger.try_claim(SHOW, &[1, 2]).unwrap();
        ledger.commit(token).unwrap();
        ledger.cancel_booked(SHOW, &[1, 2]).unwrap();

        // Неотличимо от мест, которые никогда не удерживались.
        let snapshot = ledger.snapshot(SHOW).unwrap();
        assert!(snapshot.values().all(|s| *s == SeatStatus::Available));
        assert!(ledger.try_claim(SHOW, &[1, 2]).is_ok());
    }

    #[test]
    fn cancel_booked_requires_booked_status() {
        let ledger = default_ledger(3);
        let _held = ledger.try_claim(SHOW, &[2]).unwrap();

        let err = ledger.cancel_booked(SHOW, &[1, 2]).unwrap_err();
        assert_eq!(
            err,
            TicketError::NotBooked {
                seat_ids: vec![1, 2]
            }
        );
        // Отказ ничего не меняет.
        assert_eq!(ledger.snapshot(SHOW).unwrap()[&2], SeatStatus::Held);
    }

    #[test]
    fn expired_hold_is_available_without_release() {
        let ledger = ledger_with_seats(2, Duration::from_millis(20));
        let _token = ledger.try_claim(SHOW, &[1]).unwrap();
        thread::sleep(Duration::from_millis(60));

        // Ленивая очистка при первом же обращении к показу.
        assert_eq!(ledger.snapshot(SHOW).unwrap()[&1], SeatStatus::Available);
    }

    #[test]
    fn commit_after_expiry_is_invalid_token() {
        let ledger = ledger_with_seats(2, Duration::from_millis(20));
        let token = ledger.try_claim(SHOW, &[1]).unwrap();
        thread::sleep(Duration::from_millis(60));

        assert_eq!(ledger.commit(token), Err(TicketError::InvalidToken));
        // Место досталось следующему претенденту, а не зависло.
        assert!(ledger.try_claim(SHOW, &[1]).is_ok());
    }

    #[test]
    fn sweep_collects_expired_holds() {
        let ledger = ledger_with_seats(4, Duration::from_millis(20));
        let _a = ledger.try_claim(SHOW, &[1, 2]).unwrap();
        let _b = ledger.try_claim(SHOW, &[3]).unwrap();
        thread::sleep(Duration::from_millis(60));

        assert_eq!(ledger.sweep_expired(), 2);
        assert_eq!(ledger.sweep_expired(), 0);
    }

    #[test]
    fn disjoint_concurrent_claims_both_succeed() {
        let ledger = Arc::new(default_ledger(4));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [[1, 2], [3, 4]]
            .into_iter()
            .map(|seats| {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    ledger.try_claim(SHOW, &seats)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }

    #[test]
    fn overlapping_concurrent_claims_have_one_winner() {
        let ledger = Arc::new(default_ledger(2));
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));

        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    ledger.try_claim(SHOW, &[1])
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for result in results {
            if let Err(err) = result {
                assert_eq!(err, TicketError::SeatUnavailable { seat_ids: vec![1] });
            }
        }
    }

    proptest! {
        /// Успешные заявки попарно не пересекаются, а после коммита
        /// каждой из них множество BOOKED мест равно их объединению.
        #[test]
        fn committed_claims_never_overlap(requests in prop::collection::vec(
            prop::collection::btree_set(1i64..=10, 1..5),
            1..12,
        )) {
            let ledger = default_ledger(10);
            let mut committed: Vec<BTreeSet<SeatId>> = Vec::new();

            for request in requests {
                let seats: Vec<SeatId> = request.iter().copied().collect();
                if let Ok(token) = ledger.try_claim(SHOW, &seats) {
                    ledger.commit(token).unwrap();
                    committed.push(request);
                }
            }

            for (i, a) in committed.iter().enumerate() {
                for b in &committed[i + 1..] {
                    prop_assert!(a.is_disjoint(b));
                }
            }

            let booked: BTreeSet<SeatId> = ledger
                .snapshot(SHOW)
                .unwrap()
                .into_iter()
                .filter(|(_, status)| *status == SeatStatus::Booked)
                .map(|(id, _)| id)
                .collect();
            let expected: BTreeSet<SeatId> =
                committed.into_iter().flatten().collect();
            prop_assert_eq!(booked, expected);
        }
    }
}

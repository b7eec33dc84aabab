//! Postgres-backed store
//!
//! Counter-touching operations run in one transaction and lock rows in a
//! fixed order: allocation, hostel, room.

use super::{HostelStore, NewStudent};
use crate::error::{HostelError, HostelResult};
use crate::models::*;
use crate::service::occupancy::{
    audit_occupancy, plan_allocation, plan_transition, room_status_for, transition_dates, vacate,
    AllocationFacts, RoomChange, TransitionEffect,
};
use crate::service::resolved_date_for;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

const ALLOCATION_VIEW_SELECT: &str = r#"
    SELECT a.*,
           s.first_name || ' ' || s.last_name AS student_name,
           s.enrollment_no,
           h.name AS hostel_name,
           r.room_number
    FROM allocations a
    JOIN students s ON s.id = a.student_id
    JOIN hostels h ON h.id = a.hostel_id
    JOIN rooms r ON r.id = a.room_id
"#;

const COMPLAINT_VIEW_SELECT: &str = r#"
    SELECT c.*,
           s.first_name || ' ' || s.last_name AS student_name,
           h.name AS hostel_name,
           r.room_number
    FROM complaints c
    JOIN students s ON s.id = c.student_id
    JOIN hostels h ON h.id = c.hostel_id
    LEFT JOIN rooms r ON r.id = c.room_id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Name of the unique constraint a failed write tripped over, if any
fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default())
        }
        _ => None,
    }
}

async fn lock_hostel(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Hostel>, sqlx::Error> {
    sqlx::query_as::<_, Hostel>("SELECT * FROM hostels WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
}

async fn lock_room(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Room>, sqlx::Error> {
    sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
}

/// Write a room's new counters and move the hostel aggregates with it
async fn apply_room_change(
    tx: &mut Transaction<'_, Postgres>,
    room: &Room,
    change: RoomChange,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE rooms SET occupied_beds = $2, status = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(room.id)
    .bind(change.occupied_beds)
    .bind(change.status)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE hostels
        SET occupied_capacity = GREATEST(occupied_capacity + $2, 0),
            occupied_rooms = GREATEST(occupied_rooms + $3, 0),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(room.hostel_id)
    .bind(change.hostel_capacity_delta)
    .bind(change.hostel_rooms_delta)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl HostelStore for PgStore {
    async fn insert_hostel(&self, input: CreateHostel) -> HostelResult<Hostel> {
        let hostel = sqlx::query_as::<_, Hostel>(
            r#"
            INSERT INTO hostels (name, hostel_type, total_rooms, total_capacity,
                                 warden_name, warden_phone, warden_email,
                                 facilities, address, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(input.name.trim())
        .bind(input.hostel_type)
        .bind(input.total_rooms)
        .bind(input.total_capacity)
        .bind(&input.warden.name)
        .bind(&input.warden.phone)
        .bind(&input.warden.email)
        .bind(&input.facilities)
        .bind(&input.address)
        .bind(input.status.unwrap_or(HostelStatus::Active))
        .fetch_one(&self.pool)
        .await?;

        Ok(hostel)
    }

    async fn list_hostels(&self) -> HostelResult<Vec<Hostel>> {
        let hostels =
            sqlx::query_as::<_, Hostel>("SELECT * FROM hostels ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(hostels)
    }

    async fn update_hostel(&self, id: Uuid, patch: UpdateHostel) -> HostelResult<Option<Hostel>> {
        let replace_warden = patch.warden.is_some();
        let warden = patch.warden.unwrap_or_default();

        let hostel = sqlx::query_as::<_, Hostel>(
            r#"
            UPDATE hostels
            SET name = COALESCE($2, name),
                hostel_type = COALESCE($3, hostel_type),
                total_rooms = COALESCE($4, total_rooms),
                total_capacity = COALESCE($5, total_capacity),
                warden_name = CASE WHEN $6 THEN $7 ELSE warden_name END,
                warden_phone = CASE WHEN $6 THEN $8 ELSE warden_phone END,
                warden_email = CASE WHEN $6 THEN $9 ELSE warden_email END,
                facilities = COALESCE($10, facilities),
                address = COALESCE($11, address),
                status = COALESCE($12, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref().map(str::trim))
        .bind(patch.hostel_type)
        .bind(patch.total_rooms)
        .bind(patch.total_capacity)
        .bind(replace_warden)
        .bind(&warden.name)
        .bind(&warden.phone)
        .bind(&warden.email)
        .bind(&patch.facilities)
        .bind(&patch.address)
        .bind(patch.status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hostel)
    }

    async fn delete_hostel(&self, id: Uuid) -> HostelResult<bool> {
        let mut tx = self.pool.begin().await?;

        if lock_hostel(&mut tx, id).await?.is_none() {
            return Ok(false);
        }

        let has_rooms: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rooms WHERE hostel_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if has_rooms {
            return Err(HostelError::HostelInUse);
        }

        sqlx::query("DELETE FROM hostels WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn insert_room(&self, input: CreateRoom, room_type: RoomType) -> HostelResult<Room> {
        let mut tx = self.pool.begin().await?;

        lock_hostel(&mut tx, input.hostel_id)
            .await?
            .ok_or(HostelError::NotFound("Hostel"))?;

        let room = sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (room_number, hostel_id, floor, capacity, room_type,
                               facilities, rent, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(input.room_number.trim())
        .bind(input.hostel_id)
        .bind(input.floor)
        .bind(input.capacity)
        .bind(room_type)
        .bind(&input.facilities)
        .bind(input.rent)
        .bind(input.status.unwrap_or(RoomStatus::Available))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => HostelError::DuplicateRoom(input.room_number.trim().to_string()),
            None => HostelError::Database(e),
        })?;

        sqlx::query(
            "UPDATE hostels SET total_rooms = total_rooms + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(input.hostel_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(room)
    }

    async fn list_rooms(&self, filter: RoomFilter) -> HostelResult<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(
            r#"
            SELECT * FROM rooms
            WHERE ($1::uuid IS NULL OR hostel_id = $1)
              AND ($2::room_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.hostel_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    async fn insert_student(&self, input: NewStudent) -> HostelResult<Student> {
        let duplicate = |e: sqlx::Error| match unique_violation(&e) {
            Some(_) => HostelError::DuplicateStudent,
            None => HostelError::Database(e),
        };

        let mut tx = self.pool.begin().await?;

        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (first_name, last_name, enrollment_no)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.enrollment_no.trim())
        .fetch_one(&mut *tx)
        .await
        .map_err(duplicate)?;

        if let Some(account) = input.account {
            sqlx::query(
                r#"
                INSERT INTO users (username, password_hash, role, student_id)
                VALUES ($1, $2, 'student', $3)
                "#,
            )
            .bind(account.username.trim())
            .bind(&account.password_hash)
            .bind(student.id)
            .execute(&mut *tx)
            .await
            .map_err(duplicate)?;
        }

        tx.commit().await?;
        Ok(student)
    }

    async fn list_allocations(
        &self,
        student_id: Option<Uuid>,
    ) -> HostelResult<Vec<AllocationView>> {
        let sql = format!(
            "{} WHERE ($1::uuid IS NULL OR a.student_id = $1) ORDER BY a.created_at DESC",
            ALLOCATION_VIEW_SELECT
        );
        let allocations = sqlx::query_as::<_, AllocationView>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(allocations)
    }

    async fn get_allocation(&self, id: Uuid) -> HostelResult<Option<AllocationView>> {
        let sql = format!("{} WHERE a.id = $1", ALLOCATION_VIEW_SELECT);
        let allocation = sqlx::query_as::<_, AllocationView>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(allocation)
    }

    async fn active_allocation(&self, student_id: Uuid) -> HostelResult<Option<Allocation>> {
        let allocation = sqlx::query_as::<_, Allocation>(
            r#"
            SELECT * FROM allocations
            WHERE student_id = $1 AND status IN ('allocated', 'checked-in')
            ORDER BY allocation_date DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(allocation)
    }

    async fn allocate(&self, input: CreateAllocation) -> HostelResult<Allocation> {
        let mut tx = self.pool.begin().await?;

        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(input.student_id)
            .fetch_optional(&mut *tx)
            .await?;
        let hostel = lock_hostel(&mut tx, input.hostel_id).await?;
        let room = lock_room(&mut tx, input.room_id).await?;

        let student_already_allocated: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM allocations
                WHERE student_id = $1 AND academic_year = $2 AND status <> 'cancelled'
            )
            "#,
        )
        .bind(input.student_id)
        .bind(&input.academic_year)
        .fetch_one(&mut *tx)
        .await?;

        let taken_beds: Vec<i32> = sqlx::query_scalar(
            "SELECT bed_number FROM allocations WHERE room_id = $1 AND status IN ('allocated', 'checked-in')",
        )
        .bind(input.room_id)
        .fetch_all(&mut *tx)
        .await?;

        let plan = plan_allocation(
            &input,
            AllocationFacts {
                student: student.as_ref(),
                hostel: hostel.as_ref(),
                room: room.as_ref(),
                student_already_allocated,
                taken_beds: &taken_beds,
            },
        )?;
        let room = room.ok_or(HostelError::NotFound("Room"))?;

        let allocation = sqlx::query_as::<_, Allocation>(
            r#"
            INSERT INTO allocations (student_id, hostel_id, room_id, bed_number,
                                     academic_year, status, rent, security_deposit, remarks)
            VALUES ($1, $2, $3, $4, $5, 'allocated', $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(input.student_id)
        .bind(input.hostel_id)
        .bind(input.room_id)
        .bind(plan.bed_number)
        .bind(&input.academic_year)
        .bind(plan.rent)
        .bind(plan.security_deposit)
        .bind(&input.remarks)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some("allocations_room_bed_active") => HostelError::BedTaken(plan.bed_number),
            Some(_) => HostelError::DuplicateAllocation {
                academic_year: input.academic_year.clone(),
            },
            None => HostelError::Database(e),
        })?;

        apply_room_change(&mut tx, &room, plan.room_change).await?;
        tx.commit().await?;

        Ok(allocation)
    }

    async fn set_allocation_status(
        &self,
        id: Uuid,
        status: AllocationStatus,
    ) -> HostelResult<Allocation> {
        let mut tx = self.pool.begin().await?;

        let current =
            sqlx::query_as::<_, Allocation>("SELECT * FROM allocations WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(HostelError::NotFound("Allocation"))?;

        let effect = plan_transition(current.status, status)?;
        if effect == TransitionEffect::Unchanged {
            return Ok(current);
        }

        if effect == TransitionEffect::Release {
            lock_hostel(&mut tx, current.hostel_id).await?;
            let room = lock_room(&mut tx, current.room_id)
                .await?
                .ok_or(HostelError::NotFound("Room"))?;
            apply_room_change(&mut tx, &room, vacate(&room)).await?;
        }

        let (check_in_date, check_out_date) = transition_dates(&current, status, Utc::now());
        let allocation = sqlx::query_as::<_, Allocation>(
            r#"
            UPDATE allocations
            SET status = $2, check_in_date = $3, check_out_date = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(check_in_date)
        .bind(check_out_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(allocation)
    }

    async fn insert_complaint(&self, input: NewComplaint) -> HostelResult<Complaint> {
        let complaint = sqlx::query_as::<_, Complaint>(
            r#"
            INSERT INTO complaints (student_id, hostel_id, room_id, title, description,
                                    category, priority)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(input.student_id)
        .bind(input.hostel_id)
        .bind(input.room_id)
        .bind(input.title.trim())
        .bind(&input.description)
        .bind(input.category)
        .bind(input.priority)
        .fetch_one(&self.pool)
        .await?;
        Ok(complaint)
    }

    async fn list_complaints(&self, student_id: Option<Uuid>) -> HostelResult<Vec<ComplaintView>> {
        let sql = format!(
            "{} WHERE ($1::uuid IS NULL OR c.student_id = $1) ORDER BY c.created_at DESC",
            COMPLAINT_VIEW_SELECT
        );
        let complaints = sqlx::query_as::<_, ComplaintView>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(complaints)
    }

    async fn update_complaint(
        &self,
        id: Uuid,
        update: UpdateComplaintStatus,
    ) -> HostelResult<Option<Complaint>> {
        let resolved_date = resolved_date_for(update.status, Utc::now());
        let complaint = sqlx::query_as::<_, Complaint>(
            r#"
            UPDATE complaints
            SET status = $2,
                admin_remarks = COALESCE($3, admin_remarks),
                assigned_to = COALESCE($4, assigned_to),
                resolved_date = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(&update.admin_remarks)
        .bind(&update.assigned_to)
        .bind(resolved_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(complaint)
    }

    async fn reconcile(&self, repair: bool) -> HostelResult<OccupancyReport> {
        let mut tx = self.pool.begin().await?;

        let hostels =
            sqlx::query_as::<_, Hostel>("SELECT * FROM hostels ORDER BY created_at FOR UPDATE")
                .fetch_all(&mut *tx)
                .await?;
        let rooms = sqlx::query_as::<_, Room>("SELECT * FROM rooms ORDER BY created_at FOR UPDATE")
            .fetch_all(&mut *tx)
            .await?;
        let counts: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT room_id, COUNT(*) FROM allocations
            WHERE status IN ('allocated', 'checked-in')
            GROUP BY room_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let active_beds: HashMap<Uuid, i32> = counts
            .into_iter()
            .map(|(room_id, count)| (room_id, i32::try_from(count).unwrap_or(i32::MAX)))
            .collect();

        let mut report = audit_occupancy(&hostels, &rooms, &active_beds);
        if !repair || report.is_consistent() {
            return Ok(report);
        }

        let rooms_by_id: HashMap<Uuid, &Room> = rooms.iter().map(|r| (r.id, r)).collect();
        for drift in &report.room_drift {
            let status = rooms_by_id
                .get(&drift.room_id)
                .map(|room| room_status_for(room.status, drift.actual_beds, room.capacity))
                .unwrap_or(RoomStatus::Available);

            sqlx::query(
                "UPDATE rooms SET occupied_beds = $2, status = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(drift.room_id)
            .bind(drift.actual_beds)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        }

        for drift in &report.hostel_drift {
            sqlx::query(
                r#"
                UPDATE hostels
                SET occupied_capacity = $2, occupied_rooms = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(drift.hostel_id)
            .bind(drift.actual_capacity)
            .bind(drift.actual_rooms)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        report.repaired = true;
        Ok(report)
    }
}

// Run against a disposable database:
// DATABASE_URL=postgres://... cargo test pg_ -- --ignored
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use crate::service::HostelService;
    use crate::validation::ValidationError;
    use std::sync::Arc;
    use tokio::sync::OnceCell;
    use tokio_test::{assert_err, assert_ok};

    const ADMIN: Caller = Caller::Admin {
        user_id: Uuid::nil(),
    };

    static MIGRATED: OnceCell<()> = OnceCell::const_new();

    /// One hostel per test, with names suffixed so tests can share a database
    struct PgFixture {
        service: HostelService,
        store: Arc<PgStore>,
        pool: PgPool,
        hostel: Hostel,
        tag: String,
    }

    impl PgFixture {
        async fn new() -> Self {
            let url = std::env::var("DATABASE_URL")
                .expect("DATABASE_URL must point at a disposable Postgres database");
            let pool = assert_ok!(create_pool(&url).await);
            MIGRATED
                .get_or_init(|| async {
                    run_migrations(&pool).await.expect("migrations apply");
                })
                .await;

            let store = Arc::new(PgStore::new(pool.clone()));
            let service = HostelService::new(store.clone());
            let tag = Uuid::new_v4().simple().to_string()[..8].to_string();
            let hostel = assert_ok!(
                service
                    .create_hostel(
                        &ADMIN,
                        CreateHostel {
                            name: format!("Sunset Girls {}", tag),
                            hostel_type: HostelType::Girls,
                            total_rooms: 0,
                            total_capacity: 0,
                            warden: Warden::default(),
                            facilities: vec!["wifi".to_string()],
                            address: "North Campus".to_string(),
                            status: None,
                        },
                    )
                    .await
            );

            Self {
                service,
                store,
                pool,
                hostel,
                tag,
            }
        }

        async fn room(&self, number: &str, capacity: i32) -> Room {
            assert_ok!(
                self.service
                    .create_room(
                        &ADMIN,
                        CreateRoom {
                            room_number: number.to_string(),
                            hostel_id: self.hostel.id,
                            floor: 1,
                            capacity,
                            room_type: None,
                            facilities: vec![],
                            rent: 4500,
                            status: None,
                        },
                    )
                    .await
            )
        }

        async fn student(&self, first_name: &str) -> Student {
            assert_ok!(
                self.store
                    .insert_student(NewStudent {
                        first_name: first_name.to_string(),
                        last_name: "Test".to_string(),
                        enrollment_no: format!("EN-{}-{}", first_name, self.tag),
                        account: None,
                    })
                    .await
            )
        }

        fn request(student: &Student, room: &Room, year: &str) -> CreateAllocation {
            CreateAllocation {
                student_id: student.id,
                hostel_id: room.hostel_id,
                room_id: room.id,
                academic_year: year.to_string(),
                bed_number: None,
                rent: None,
                security_deposit: None,
                remarks: None,
            }
        }

        async fn allocate(&self, student: &Student, room: &Room, year: &str) -> HostelResult<Allocation> {
            self.service
                .allocate_room(&ADMIN, Self::request(student, room, year))
                .await
        }

        async fn cancel(&self, allocation: &Allocation) -> Allocation {
            assert_ok!(
                self.service
                    .update_allocation_status(&ADMIN, allocation.id, AllocationStatus::Cancelled)
                    .await
            )
        }

        async fn room_state(&self, id: Uuid) -> Room {
            let rooms = assert_ok!(self.service.list_rooms_by_hostel(self.hostel.id).await);
            rooms.into_iter().find(|r| r.id == id).expect("room exists")
        }

        async fn hostel_state(&self) -> Hostel {
            let hostels = assert_ok!(self.service.list_hostels().await);
            hostels
                .into_iter()
                .find(|h| h.id == self.hostel.id)
                .expect("hostel exists")
        }

        /// Drift reported for this fixture's hostel and rooms only
        async fn own_drift(&self, repair: bool) -> (Vec<RoomDrift>, Vec<HostelDrift>) {
            let rooms = assert_ok!(self.service.list_rooms_by_hostel(self.hostel.id).await);
            let report = assert_ok!(self.store.reconcile(repair).await);
            let room_drift = report
                .room_drift
                .into_iter()
                .filter(|d| rooms.iter().any(|r| r.id == d.room_id))
                .collect();
            let hostel_drift = report
                .hostel_drift
                .into_iter()
                .filter(|d| d.hostel_id == self.hostel.id)
                .collect();
            (room_drift, hostel_drift)
        }

        async fn assert_consistent(&self) {
            let (rooms, hostels) = self.own_drift(false).await;
            assert!(rooms.is_empty(), "room drift: {:?}", rooms);
            assert!(hostels.is_empty(), "hostel drift: {:?}", hostels);
        }
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_fill_room_then_reject() {
        let fx = PgFixture::new().await;
        let room = fx.room("G101", 2).await;
        assert_eq!(room.room_type, RoomType::Double);
        assert_eq!(fx.hostel_state().await.total_rooms, 1);

        let alice = fx.student("alice").await;
        let first = assert_ok!(fx.allocate(&alice, &room, "2024-25").await);
        assert_eq!(first.bed_number, 1);
        let state = fx.room_state(room.id).await;
        assert_eq!((state.occupied_beds, state.status), (1, RoomStatus::Available));
        assert_eq!(fx.hostel_state().await.occupied_capacity, 1);

        let bob = fx.student("bob").await;
        let second = assert_ok!(fx.allocate(&bob, &room, "2024-25").await);
        assert_eq!(second.bed_number, 2);
        let state = fx.room_state(room.id).await;
        assert_eq!((state.occupied_beds, state.status), (2, RoomStatus::Occupied));
        let hostel = fx.hostel_state().await;
        assert_eq!((hostel.occupied_capacity, hostel.occupied_rooms), (2, 1));

        let carol = fx.student("carol").await;
        let err = assert_err!(fx.allocate(&carol, &room, "2024-25").await);
        assert!(matches!(err, HostelError::RoomFull), "{:?}", err);
        assert_eq!(fx.room_state(room.id).await.occupied_beds, 2);

        // The status filter is applied in SQL
        let occupied = assert_ok!(
            fx.store
                .list_rooms(RoomFilter {
                    hostel_id: Some(fx.hostel.id),
                    status: Some(RoomStatus::Occupied),
                })
                .await
        );
        assert_eq!(occupied.len(), 1);
        let available = assert_ok!(
            fx.store
                .list_rooms(RoomFilter {
                    hostel_id: Some(fx.hostel.id),
                    status: Some(RoomStatus::Available),
                })
                .await
        );
        assert!(available.is_empty());

        fx.assert_consistent().await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_cancel_frees_lowest_bed_for_reuse() {
        let fx = PgFixture::new().await;
        let room = fx.room("G101", 2).await;
        let alice = fx.student("alice").await;
        let bob = fx.student("bob").await;
        let alice_allocation = assert_ok!(fx.allocate(&alice, &room, "2024-25").await);
        assert_ok!(fx.allocate(&bob, &room, "2024-25").await);

        let cancelled = fx.cancel(&alice_allocation).await;
        assert_eq!(cancelled.status, AllocationStatus::Cancelled);
        let state = fx.room_state(room.id).await;
        assert_eq!((state.occupied_beds, state.status), (1, RoomStatus::Available));
        assert_eq!(fx.hostel_state().await.occupied_capacity, 1);

        // Cancelling twice releases nothing further
        fx.cancel(&alice_allocation).await;
        assert_eq!(fx.room_state(room.id).await.occupied_beds, 1);

        let dave = fx.student("dave").await;
        let dave_allocation = assert_ok!(fx.allocate(&dave, &room, "2024-25").await);
        assert_eq!(dave_allocation.bed_number, 1);

        let view = assert_ok!(fx.service.get_allocation(&ADMIN, dave_allocation.id).await);
        assert_eq!(view.allocation.id, dave_allocation.id);
        assert_eq!(view.student_name, "dave Test");
        assert_eq!(view.room_number, "G101");
        assert_eq!(view.hostel_name, fx.hostel.name);

        fx.assert_consistent().await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_complaint_requires_active_allocation() {
        let fx = PgFixture::new().await;
        let room = fx.room("G101", 2).await;
        let erin = fx.student("erin").await;
        let caller = Caller::Student {
            user_id: Uuid::new_v4(),
            student_id: erin.id,
        };
        let complaint = || CreateComplaint {
            title: "Ceiling fan".to_string(),
            description: "The ceiling fan stopped working last night".to_string(),
            category: ComplaintCategory::Electricity,
            priority: ComplaintPriority::High,
        };

        let err = assert_err!(fx.service.submit_complaint(&caller, complaint()).await);
        assert!(
            matches!(err, HostelError::Validation(ValidationError::NotAllocated)),
            "{:?}",
            err
        );
        assert!(assert_ok!(fx.service.list_complaints(&caller).await).is_empty());

        assert_ok!(fx.allocate(&erin, &room, "2024-25").await);
        let filed = assert_ok!(fx.service.submit_complaint(&caller, complaint()).await);
        assert_eq!(filed.hostel_id, fx.hostel.id);
        assert_eq!(filed.room_id, Some(room.id));

        let views = assert_ok!(fx.service.list_complaints(&caller).await);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].complaint.id, filed.id);
        assert_eq!(views[0].room_number.as_deref(), Some("G101"));

        let resolve = || UpdateComplaintStatus {
            status: ComplaintStatus::Resolved,
            admin_remarks: None,
            assigned_to: None,
        };
        let resolved = assert_ok!(
            fx.service
                .update_complaint_status(&ADMIN, filed.id, resolve())
                .await
        );
        assert!(resolved.resolved_date.is_some());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let resolved_again = assert_ok!(
            fx.service
                .update_complaint_status(&ADMIN, filed.id, resolve())
                .await
        );
        assert!(resolved_again.resolved_date > resolved.resolved_date);

        let missing = assert_err!(
            fx.service
                .update_complaint_status(&ADMIN, Uuid::new_v4(), resolve())
                .await
        );
        assert!(matches!(missing, HostelError::NotFound("Complaint")));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_one_allocation_per_student_per_year() {
        let fx = PgFixture::new().await;
        let g101 = fx.room("G101", 2).await;
        let g102 = fx.room("G102", 2).await;
        let alice = fx.student("alice").await;

        let first = assert_ok!(fx.allocate(&alice, &g101, "2024-25").await);
        let err = assert_err!(fx.allocate(&alice, &g102, "2024-25").await);
        assert!(matches!(err, HostelError::DuplicateAllocation { .. }), "{:?}", err);
        assert_eq!(fx.room_state(g102.id).await.occupied_beds, 0);

        assert_ok!(fx.allocate(&alice, &g102, "2025-26").await);

        // A cancelled allocation no longer holds the year
        fx.cancel(&first).await;
        let again = assert_ok!(fx.allocate(&alice, &g102, "2024-25").await);
        assert_eq!(again.bed_number, 2);

        fx.assert_consistent().await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_concurrent_requests_for_last_bed() {
        let fx = PgFixture::new().await;
        let room = fx.room("G101", 2).await;
        let alice = fx.student("alice").await;
        assert_ok!(fx.allocate(&alice, &room, "2024-25").await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let student = fx.student(&format!("s{}", i)).await;
            let service = fx.service.clone();
            let request = PgFixture::request(&student, &room, "2024-25");
            handles.push(tokio::spawn(async move {
                service.allocate_room(&ADMIN, request).await
            }));
        }

        let mut succeeded = 0;
        let mut full = 0;
        for handle in handles {
            match handle.await.expect("task panicked") {
                Ok(allocation) => {
                    assert_eq!(allocation.bed_number, 2);
                    succeeded += 1;
                }
                Err(HostelError::RoomFull) => full += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((succeeded, full), (1, 7));

        let state = fx.room_state(room.id).await;
        assert_eq!((state.occupied_beds, state.status), (2, RoomStatus::Occupied));
        assert_eq!(fx.hostel_state().await.occupied_capacity, 2);
        fx.assert_consistent().await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_concurrent_requests_for_same_year_across_rooms() {
        let fx = PgFixture::new().await;
        let alice = fx.student("alice").await;

        let mut handles = Vec::new();
        for i in 0..6 {
            let room = fx.room(&format!("G10{}", i), 2).await;
            let service = fx.service.clone();
            let request = PgFixture::request(&alice, &room, "2024-25");
            handles.push(tokio::spawn(async move {
                service.allocate_room(&ADMIN, request).await
            }));
        }

        let mut succeeded = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.expect("task panicked") {
                Ok(_) => succeeded += 1,
                Err(HostelError::DuplicateAllocation { academic_year }) => {
                    assert_eq!(academic_year, "2024-25");
                    duplicates += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((succeeded, duplicates), (1, 5));

        let rooms = assert_ok!(fx.service.list_rooms_by_hostel(fx.hostel.id).await);
        let beds: i32 = rooms.iter().map(|r| r.occupied_beds).sum();
        assert_eq!(beds, 1);
        assert_eq!(fx.hostel_state().await.occupied_capacity, 1);
        fx.assert_consistent().await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_concurrent_requests_for_same_bed() {
        let fx = PgFixture::new().await;
        let room = fx.room("G101", 3).await;

        let mut handles = Vec::new();
        for name in ["alice", "bob"] {
            let student = fx.student(name).await;
            let service = fx.service.clone();
            let request = CreateAllocation {
                bed_number: Some(3),
                ..PgFixture::request(&student, &room, "2024-25")
            };
            handles.push(tokio::spawn(async move {
                service.allocate_room(&ADMIN, request).await
            }));
        }

        let mut succeeded = 0;
        let mut taken = 0;
        for handle in handles {
            match handle.await.expect("task panicked") {
                Ok(allocation) => {
                    assert_eq!(allocation.bed_number, 3);
                    succeeded += 1;
                }
                Err(HostelError::BedTaken(3)) => taken += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((succeeded, taken), (1, 1));
        assert_eq!(fx.room_state(room.id).await.occupied_beds, 1);
        fx.assert_consistent().await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_reconcile_repairs_drift() {
        let fx = PgFixture::new().await;
        let room = fx.room("G101", 2).await;
        let alice = fx.student("alice").await;
        assert_ok!(fx.allocate(&alice, &room, "2024-25").await);
        fx.assert_consistent().await;

        assert_ok!(
            sqlx::query("UPDATE rooms SET occupied_beds = 2, status = 'occupied' WHERE id = $1")
                .bind(room.id)
                .execute(&fx.pool)
                .await
        );
        assert_ok!(
            sqlx::query("UPDATE hostels SET occupied_capacity = 5 WHERE id = $1")
                .bind(fx.hostel.id)
                .execute(&fx.pool)
                .await
        );

        let (rooms, hostels) = fx.own_drift(false).await;
        assert_eq!(rooms.len(), 1);
        assert_eq!((rooms[0].recorded_beds, rooms[0].actual_beds), (2, 1));
        assert_eq!(hostels.len(), 1);
        assert_eq!(
            (hostels[0].recorded_capacity, hostels[0].actual_capacity),
            (5, 1)
        );
        // Audit only
        assert_eq!(fx.room_state(room.id).await.occupied_beds, 2);

        let (rooms, _) = fx.own_drift(true).await;
        assert_eq!(rooms.len(), 1);
        let state = fx.room_state(room.id).await;
        assert_eq!((state.occupied_beds, state.status), (1, RoomStatus::Available));
        assert_eq!(fx.hostel_state().await.occupied_capacity, 1);
        fx.assert_consistent().await;
    }
}

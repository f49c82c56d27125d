use async_trait::async_trait;
use common::{FlightId, Pnr};
use domain::{Booking, BookingStatus, Gender, MealType, Money, Passenger, TripType};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{BookingStore, PassengerStore, Result, StoreError};

/// Runs the database migrations shared by both stores.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Corrupt(format!("unexpected {column} value '{value}'"))
}

fn non_negative(column: &str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| corrupt(column, &value.to_string()))
}

fn int_column(column: &str, value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::OutOfRange(format!("{column} value {value} exceeds INTEGER")))
}

/// PostgreSQL-backed booking store.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Creates a new PostgreSQL booking store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_booking(row: PgRow) -> Result<Booking> {
        let status: String = row.try_get("status")?;
        let trip_type: String = row.try_get("trip_type")?;

        Ok(Booking {
            pnr: Pnr::new(row.try_get::<String, _>("pnr")?),
            flight_id: FlightId::new(row.try_get::<String, _>("flight_id")?),
            booker_email: row.try_get("booker_email")?,
            status: BookingStatus::parse(&status).ok_or_else(|| corrupt("status", &status))?,
            trip_type: TripType::parse(&trip_type)
                .ok_or_else(|| corrupt("trip_type", &trip_type))?,
            booking_date_time: row.try_get("booking_date_time")?,
            seats_booked: non_negative("seats_booked", row.try_get("seats_booked")?)?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        })
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    #[tracing::instrument(skip(self, booking), fields(pnr = %booking.pnr, status = booking.status.as_str()))]
    async fn save(&self, booking: &Booking) -> Result<()> {
        let seats_booked = int_column("seats_booked", booking.seats_booked)?;
        sqlx::query(
            r#"
            INSERT INTO bookings (pnr, flight_id, booker_email, status, trip_type, booking_date_time, seats_booked, total_amount_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (pnr) DO UPDATE SET status = EXCLUDED.status
            "#,
        )
        .bind(booking.pnr.as_str())
        .bind(booking.flight_id.as_str())
        .bind(&booking.booker_email)
        .bind(booking.status.as_str())
        .bind(booking.trip_type.as_str())
        .bind(booking.booking_date_time)
        .bind(seats_booked)
        .bind(booking.total_amount.cents())
        .execute(&self.pool)
        .await?;

        metrics::counter!("store_booking_writes_total").increment(1);
        tracing::debug!("booking row written");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Option<Booking>> {
        let row = sqlx::query(
            r#"
            SELECT pnr, flight_id, booker_email, status, trip_type, booking_date_time, seats_booked, total_amount_cents
            FROM bookings
            WHERE pnr = $1
            "#,
        )
        .bind(pnr.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_booking).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_booker_email_order_by_date_desc(&self, email: &str) -> Result<Vec<Booking>> {
        let rows = sqlx::query(
            r#"
            SELECT pnr, flight_id, booker_email, status, trip_type, booking_date_time, seats_booked, total_amount_cents
            FROM bookings
            WHERE booker_email = $1
            ORDER BY booking_date_time DESC, pnr ASC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn delete_by_pnr(&self, pnr: &Pnr) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM bookings WHERE pnr = $1")
            .bind(pnr.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        tracing::debug!(deleted, "booking row deleted");
        Ok(())
    }
}

/// PostgreSQL-backed passenger store.
#[derive(Clone)]
pub struct PostgresPassengerStore {
    pool: PgPool,
}

impl PostgresPassengerStore {
    /// Creates a new PostgreSQL passenger store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_passenger(row: PgRow) -> Result<Passenger> {
        let gender: String = row.try_get("gender")?;
        let meal_type: String = row.try_get("meal_type")?;

        Ok(Passenger {
            name: row.try_get("name")?,
            age: non_negative("age", row.try_get("age")?)?,
            gender: Gender::parse(&gender).ok_or_else(|| corrupt("gender", &gender))?,
            seat_no: row.try_get("seat_no")?,
            meal_type: MealType::parse(&meal_type)
                .ok_or_else(|| corrupt("meal_type", &meal_type))?,
            flight_id: FlightId::new(row.try_get::<String, _>("flight_id")?),
            pnr: Pnr::new(row.try_get::<String, _>("pnr")?),
        })
    }
}

#[async_trait]
impl PassengerStore for PostgresPassengerStore {
    #[tracing::instrument(skip(self, passengers), fields(count = passengers.len()))]
    async fn save_all(&self, passengers: &[Passenger]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for passenger in passengers {
            let age = int_column("age", passenger.age)?;
            sqlx::query(
                r#"
                INSERT INTO passengers (pnr, flight_id, name, age, gender, seat_no, meal_type)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(passenger.pnr.as_str())
            .bind(passenger.flight_id.as_str())
            .bind(&passenger.name)
            .bind(age)
            .bind(passenger.gender.as_str())
            .bind(&passenger.seat_no)
            .bind(passenger.meal_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        metrics::counter!("store_passenger_writes_total").increment(passengers.len() as u64);
        tracing::debug!("passenger rows committed");
        Ok(())
    }

    #[tracing::instrument(skip(self, seats), fields(seat_count = seats.len()))]
    async fn find_by_flight_and_seats_in(
        &self,
        flight_id: &FlightId,
        seats: &[String],
    ) -> Result<Vec<Passenger>> {
        if seats.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT pnr, flight_id, name, age, gender, seat_no, meal_type
            FROM passengers
            WHERE flight_id = $1 AND seat_no = ANY($2)
            ORDER BY id ASC
            "#,
        )
        .bind(flight_id.as_str())
        .bind(seats)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_passenger).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Vec<Passenger>> {
        let rows = sqlx::query(
            r#"
            SELECT pnr, flight_id, name, age, gender, seat_no, meal_type
            FROM passengers
            WHERE pnr = $1
            ORDER BY id ASC
            "#,
        )
        .bind(pnr.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_passenger).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn count_by_pnr(&self, pnr: &Pnr) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passengers WHERE pnr = $1")
            .bind(pnr.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

use chrono::NaiveDate;
use reservation_core::{
    Address, DbError, Guest, GuestRepository, RepoError, Reservation, ReservationRepository,
    Session, SqliteGuestRepository, SqliteReservationRepository,
};
use uuid::Uuid;

#[test]
fn guest_profile_round_trips_with_addresses() {
    let session = Session::open_in_memory("reservation").unwrap();
    let guests = SqliteGuestRepository::new(&session);

    let mut guest = guest_named("Adaeze", "Okafor");
    guest.title = Some("Dr.".to_string());
    guest.emails.insert("adaeze@example.com".to_string());
    guest.emails.insert("a.okafor@example.org".to_string());
    guest.phone_numbers = vec!["+1-555-0100".to_string(), "+1-555-0199".to_string()];
    guest.addresses.insert(
        "home".to_string(),
        Address {
            street: Some("12 Harbor Rd".to_string()),
            city: Some("Portland".to_string()),
            state_or_province: Some("ME".to_string()),
            postal_code: Some("04101".to_string()),
            country: Some("US".to_string()),
        },
    );
    guest.addresses.insert(
        "work".to_string(),
        Address {
            city: Some("Boston".to_string()),
            ..Address::default()
        },
    );

    assert_eq!(guests.upsert_guest(&guest).unwrap(), guest.guest_id);
    let loaded = guests.find_guest(guest.guest_id).unwrap().unwrap();
    assert_eq!(loaded, guest);
    assert_eq!(loaded.addresses["work"].street, None);
}

#[test]
fn unknown_guest_is_none() {
    let session = Session::open_in_memory("reservation").unwrap();
    let guests = SqliteGuestRepository::new(&session);

    assert!(guests.find_guest(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn reservations_for_profiled_guest_are_indexed_by_last_name() {
    let session = Session::open_in_memory("reservation").unwrap();
    let guests = SqliteGuestRepository::new(&session);
    let reservations = SqliteReservationRepository::new(&session);

    let guest = guest_named("Adaeze", "Okafor");
    guests.upsert_guest(&guest).unwrap();

    let mut later = Reservation::new("SFO02", day(2024, 9, 1), day(2024, 9, 3), 44, guest.guest_id);
    let mut earlier =
        Reservation::new("BOS05", day(2024, 8, 1), day(2024, 8, 2), 12, guest.guest_id);
    let later_number = reservations.upsert(&mut later).unwrap();
    let earlier_number = reservations.upsert(&mut earlier).unwrap();

    let found = reservations.find_by_guest_last_name("Okafor").unwrap();
    let hotels: Vec<&str> = found.iter().map(|item| item.hotel_id.as_str()).collect();
    assert_eq!(hotels, ["BOS05", "SFO02"]);
    assert_eq!(found[0].confirmation_number.as_deref(), Some(earlier_number.as_str()));
    assert_eq!(found[1], later);

    assert!(reservations.delete(&later_number).unwrap());
    let remaining = reservations.find_by_guest_last_name("Okafor").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].hotel_id, "BOS05");
}

#[test]
fn reservations_without_guest_profile_skip_name_index() {
    let session = Session::open_in_memory("reservation").unwrap();
    let guests = SqliteGuestRepository::new(&session);
    let reservations = SqliteReservationRepository::new(&session);

    let nameless = Guest::new(Uuid::new_v4());
    guests.upsert_guest(&nameless).unwrap();

    let mut unknown_guest =
        Reservation::new("NYC01", day(2024, 7, 1), day(2024, 7, 2), 101, Uuid::new_v4());
    let mut blank_name =
        Reservation::new("NYC01", day(2024, 7, 1), day(2024, 7, 2), 102, nameless.guest_id);
    let first = reservations.upsert(&mut unknown_guest).unwrap();
    let second = reservations.upsert(&mut blank_name).unwrap();

    assert!(reservations.exists(&first).unwrap());
    assert!(reservations.exists(&second).unwrap());
    assert_eq!(
        reservations
            .find_by_hotel_and_date("NYC01", day(2024, 7, 1))
            .unwrap()
            .len(),
        2
    );
    assert!(reservations.delete(&first).unwrap());
    assert!(reservations.delete(&second).unwrap());
}

#[test]
fn last_name_lookup_trims_input_and_rejects_blank() {
    let session = Session::open_in_memory("reservation").unwrap();
    let guests = SqliteGuestRepository::new(&session);
    let reservations = SqliteReservationRepository::new(&session);

    let guest = guest_named("Lin", "  Zhang ");
    guests.upsert_guest(&guest).unwrap();
    let mut reservation =
        Reservation::new("NYC01", day(2024, 7, 1), day(2024, 7, 2), 9, guest.guest_id);
    reservations.upsert(&mut reservation).unwrap();

    assert_eq!(reservations.find_by_guest_last_name(" Zhang").unwrap().len(), 1);
    assert!(reservations.find_by_guest_last_name("Smith").unwrap().is_empty());
    assert!(matches!(
        reservations.find_by_guest_last_name(" "),
        Err(RepoError::InvalidArgument("last_name"))
    ));
}

#[test]
fn changing_hotel_moves_the_guest_index_copy() {
    let session = Session::open_in_memory("reservation").unwrap();
    let guests = SqliteGuestRepository::new(&session);
    let reservations = SqliteReservationRepository::new(&session);
    let guest = guest_named("Adaeze", "Okafor");
    guests.upsert_guest(&guest).unwrap();

    let mut reservation =
        Reservation::new("NYC01", day(2024, 7, 1), day(2024, 7, 2), 101, guest.guest_id)
            .with_confirmation_number("C-MOVE");
    reservations.upsert(&mut reservation).unwrap();
    reservation.hotel_id = "SFO02".to_string();
    reservations.upsert(&mut reservation).unwrap();

    let found = reservations.find_by_guest_last_name("Okafor").unwrap();
    assert_eq!(found, vec![reservation.clone()]);

    assert!(reservations.delete("C-MOVE").unwrap());
    assert!(reservations.find_by_guest_last_name("Okafor").unwrap().is_empty());
}

#[test]
fn failed_guest_index_write_reports_partial_upsert() {
    let session = Session::open_in_memory("reservation").unwrap();
    let guests = SqliteGuestRepository::new(&session);
    let reservations = SqliteReservationRepository::new(&session);
    let guest = guest_named("Adaeze", "Okafor");
    guests.upsert_guest(&guest).unwrap();
    fail_guest_index(&session, "INSERT");

    let mut reservation =
        Reservation::new("NYC01", day(2024, 7, 1), day(2024, 7, 2), 101, guest.guest_id)
            .with_confirmation_number("C-GUEST");
    let err = reservations.upsert(&mut reservation).unwrap_err();

    match err {
        RepoError::PartialWrite {
            confirmation_number,
            completed,
            failed,
            source,
        } => {
            assert_eq!(confirmation_number, "C-GUEST");
            assert_eq!(
                completed,
                ["reservations_by_hotel_date", "reservations_by_confirmation"]
            );
            assert_eq!(failed, "reservations_by_guest");
            assert!(matches!(source, DbError::Sqlite(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(reservations.exists("C-GUEST").unwrap());
    assert!(reservations.find_by_guest_last_name("Okafor").unwrap().is_empty());
}

#[test]
fn failed_guest_index_delete_reports_partial_delete() {
    let session = Session::open_in_memory("reservation").unwrap();
    let guests = SqliteGuestRepository::new(&session);
    let reservations = SqliteReservationRepository::new(&session);
    let guest = guest_named("Adaeze", "Okafor");
    guests.upsert_guest(&guest).unwrap();
    let mut reservation =
        Reservation::new("NYC01", day(2024, 7, 1), day(2024, 7, 2), 101, guest.guest_id)
            .with_confirmation_number("C-GUEST");
    reservations.upsert(&mut reservation).unwrap();
    fail_guest_index(&session, "DELETE");

    let err = reservations.delete("C-GUEST").unwrap_err();

    match err {
        RepoError::PartialWrite {
            completed, failed, ..
        } => {
            assert_eq!(
                completed,
                ["reservations_by_hotel_date", "reservations_by_confirmation"]
            );
            assert_eq!(failed, "reservations_by_guest");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!reservations.exists("C-GUEST").unwrap());
    assert_eq!(reservations.find_by_guest_last_name("Okafor").unwrap().len(), 1);
}

fn fail_guest_index(session: &Session, operation: &str) {
    session
        .with_connection(|conn| {
            conn.execute_batch(&format!(
                "CREATE TRIGGER reservation.fail_guest_index_{operation}
                 BEFORE {operation} ON reservations_by_guest
                 BEGIN
                     SELECT RAISE(ABORT, 'guest index unavailable');
                 END;"
            ))?;
            Ok::<_, DbError>(())
        })
        .unwrap();
}

fn guest_named(first_name: &str, last_name: &str) -> Guest {
    let mut guest = Guest::new(Uuid::new_v4());
    guest.first_name = Some(first_name.to_string());
    guest.last_name = Some(last_name.to_string());
    guest
}

fn day(year: i32, month: u32, date: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, date).unwrap()
}

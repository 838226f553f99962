//! Reconstruction of the company graph from join fan-out rows

use std::rc::Rc;

use joingraph::domain::{Company, CompanyMapper, Email, Phone, EMAILS, PHONES, ROOT};
use joingraph::entity_mapper::{
    assemble, assemble_with_stats, attach_unique, into_owned, DeduplicatingMapper, EntityMapper,
    Fragment, MapperError, RowCursor, RowOutcome,
};
use test_case::test_case;

fn row(company: Option<Company>, email: Option<Email>, phone: Option<Phone>) -> RowCursor {
    let company = match company {
        Some(c) => Fragment::aliased(ROOT, c),
        None => Fragment::absent::<Company>(Some(ROOT.to_string())),
    };
    let email = match email {
        Some(e) => Fragment::aliased(EMAILS, e),
        None => Fragment::absent::<Email>(Some(EMAILS.to_string())),
    };
    let phone = match phone {
        Some(p) => Fragment::aliased(PHONES, p),
        None => Fragment::absent::<Phone>(Some(PHONES.to_string())),
    };
    RowCursor::new(vec![company, email, phone])
}

fn acme() -> Company {
    Company::new(1, "Acme")
}

fn email_a() -> Email {
    Email::new(10, "a@acme.io")
}

fn email_b() -> Email {
    Email::new(11, "b@acme.io")
}

#[test]
fn test_same_row_twice_maps_once() {
    let mut mapper = CompanyMapper::deduplicating();

    let first = mapper
        .map(&mut row(Some(acme()), Some(email_a()), None))
        .unwrap();
    let second = mapper
        .map(&mut row(Some(acme()), Some(email_a()), None))
        .unwrap();

    let first = first.into_entity().expect("first sighting is a new entity");
    assert!(second.is_duplicate());
    assert!(Rc::ptr_eq(&first, second.handle().unwrap()));
}

#[test]
fn test_consumption_order_drift_loses_relation() {
    // Consumes phones before emails, against the declared order
    let mut misordered = |cursor: &mut RowCursor| -> Result<RowOutcome<Company>, MapperError> {
        let company = cursor.take_first::<Company>()?;
        let phone = cursor.take_next::<Phone>(Some(PHONES))?;
        let email = cursor.take_next::<Email>(Some(EMAILS))?;
        let Some(company) = company else {
            return Ok(RowOutcome::Empty);
        };
        if let Some(phone) = phone {
            company.borrow_mut().phones.push(phone);
        }
        if let Some(email) = email {
            company.borrow_mut().emails.push(email);
        }
        Ok(RowOutcome::Entity(company))
    };

    let mut cursor = row(
        Some(acme()),
        Some(email_a()),
        Some(Phone::new(20, "555-0100")),
    );
    let company = misordered
        .map(&mut cursor)
        .unwrap()
        .into_entity()
        .unwrap();

    let company = company.borrow();
    assert_eq!(company.emails, vec![email_a()]);
    assert!(company.phones.is_empty(), "phone slot was never reached");
    assert_eq!(cursor.remaining(), 1);
}

#[test_case(email_a(), email_b() ; "a then b")]
#[test_case(email_b(), email_a() ; "b then a")]
fn test_children_from_two_rows_merge(first: Email, second: Email) {
    let mut mapper = CompanyMapper::deduplicating();
    let rows = vec![
        row(Some(acme()), Some(first), None),
        row(Some(acme()), Some(second), None),
    ];

    let companies = into_owned(assemble(rows, &mut mapper).unwrap());

    assert_eq!(companies.len(), 1);
    let mut addresses: Vec<_> = companies[0]
        .emails
        .iter()
        .map(|e| e.address.as_str())
        .collect();
    addresses.sort_unstable();
    assert_eq!(addresses, vec!["a@acme.io", "b@acme.io"]);
}

#[test]
fn test_redelivered_child_is_attached_once() {
    let mut mapper = CompanyMapper::deduplicating();
    let rows = vec![
        row(Some(acme()), Some(email_a()), Some(Phone::new(20, "555-0100"))),
        row(Some(acme()), Some(email_a()), Some(Phone::new(21, "555-0101"))),
    ];

    let companies = into_owned(assemble(rows, &mut mapper).unwrap());

    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].emails, vec![email_a()]);
    assert_eq!(companies[0].phones.len(), 2);
}

#[test]
fn test_null_primary_key_is_rejected() {
    let mut mapper = CompanyMapper::deduplicating();
    let keyless = Company {
        id: None,
        name: "Nameless".to_string(),
        ..Default::default()
    };

    let err = mapper
        .map(&mut row(Some(keyless), Some(email_a()), None))
        .unwrap_err();

    assert!(matches!(err, MapperError::NullPrimaryKey { .. }));
    assert!(!err.is_configuration_error());
    assert_eq!(mapper.cached_len(), 0);
}

#[test]
fn test_absent_relation_keeps_parent() {
    let mut mapper = CompanyMapper::deduplicating();
    let rows = vec![
        row(Some(acme()), None, None),
        row(Some(Company::new(2, "Globex")), Some(email_b()), None),
        row(Some(acme()), None, None),
    ];

    let companies = into_owned(assemble(rows, &mut mapper).unwrap());

    assert_eq!(companies.len(), 2);
    assert_eq!(companies[0].name, "Acme");
    assert!(companies[0].emails.is_empty());
    assert!(companies[0].phones.is_empty());
    assert_eq!(companies[1].emails, vec![email_b()]);
}

#[test]
fn test_cross_product_fan_out() {
    // 2 emails x 3 phones for one company, as a join would deliver them
    let emails = [email_a(), email_b()];
    let phones = [
        Phone::new(20, "555-0100"),
        Phone::new(21, "555-0101"),
        Phone::new(22, "555-0102"),
    ];
    let rows: Vec<RowCursor> = emails
        .iter()
        .flat_map(|e| {
            phones
                .iter()
                .map(move |p| row(Some(acme()), Some(e.clone()), Some(p.clone())))
        })
        .collect();

    let mut mapper = CompanyMapper::deduplicating();
    let (companies, stats) = assemble_with_stats(rows, &mut mapper).unwrap();

    assert_eq!(stats.rows, 6);
    assert_eq!(stats.entities, 1);
    assert_eq!(stats.duplicates, 5);
    let company = companies[0].borrow();
    assert_eq!(company.emails.len(), 2);
    assert_eq!(company.phones.len(), 3);
}

#[test]
fn test_fresh_mapper_per_query() {
    let rows = || vec![row(Some(acme()), Some(email_a()), None)];

    let mut first_query = CompanyMapper::deduplicating();
    let mut second_query = CompanyMapper::deduplicating();
    let first = assemble(rows(), &mut first_query).unwrap();
    let second = assemble(rows(), &mut second_query).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(!Rc::ptr_eq(&first[0], &second[0]));
}

#[test]
fn test_wrong_root_type_is_fatal() {
    let mut mapper = CompanyMapper::deduplicating();
    let mut cursor = RowCursor::new(vec![Fragment::aliased(ROOT, email_a())]);

    let err = mapper.map(&mut cursor).unwrap_err();
    assert!(matches!(err, MapperError::TypeMismatch { position: 0, .. }));
    assert!(err.is_configuration_error());
}

#[test]
fn test_nested_deduplicating_mappers() {
    // Deduplicate emails by id while attaching them to deduplicated companies
    let mut emails = DeduplicatingMapper::new(
        |cursor: &mut RowCursor| -> Result<RowOutcome<Email>, MapperError> {
            Ok(match cursor.take_first::<Email>()? {
                Some(email) => RowOutcome::Entity(email),
                None => RowOutcome::Empty,
            })
        },
        |email: &Email| Some(email.id),
    );
    let mut mapper = DeduplicatingMapper::new(
        move |cursor: &mut RowCursor| -> Result<RowOutcome<Company>, MapperError> {
            let Some(company) = cursor.take_first::<Company>()? else {
                return Ok(RowOutcome::Empty);
            };
            if let Some(email) = emails.map(cursor)?.handle() {
                let email = email.borrow().clone();
                attach_unique(&mut company.borrow_mut().emails, email, |e| e.id);
            }
            Ok(RowOutcome::Entity(company))
        },
        |company: &Company| company.id,
    );

    let rows = vec![
        RowCursor::new(vec![Fragment::new(acme()), Fragment::new(email_a())]),
        RowCursor::new(vec![Fragment::new(acme()), Fragment::new(email_a())]),
        RowCursor::new(vec![Fragment::new(acme()), Fragment::new(email_b())]),
    ];
    let companies = into_owned(assemble(rows, &mut mapper).unwrap());

    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].emails, vec![email_a(), email_b()]);
}

//! Statement splitting on realistic scripts.

use pretty_assertions::assert_eq;
use sql_query_hub::query::{split_statements, HeuristicSplitter, StatementSplitter};

const MIGRATION: &str = r#"
-- Schema for the orders service
CREATE TABLE IF NOT EXISTS orders (
    id      INT PRIMARY KEY AUTO_INCREMENT,
    total   DECIMAL(10, 2) NOT NULL, -- gross amount
    status  VARCHAR(20)
);

INSERT INTO orders (total, status) VALUES (10.00, 'new');

DELIMITER $$
CREATE DEFINER=`admin`@`%` TRIGGER orders_status BEFORE INSERT ON orders
FOR EACH ROW
BEGIN
    IF NEW.status IS NULL THEN
        SET NEW.status = 'new';
    END IF;
END$$

CREATE PROCEDURE order_count()
BEGIN
    SELECT COUNT(*) FROM orders;
END$$
DELIMITER ;

SELECT * FROM orders;
"#;

#[test]
fn test_split_mysql_migration() {
    let statements = split_statements(MIGRATION);
    let texts: Vec<&str> = statements.iter().map(|s| s.as_str()).collect();

    assert_eq!(
        texts,
        vec![
            "CREATE TABLE IF NOT EXISTS orders ( id INT PRIMARY KEY AUTO_INCREMENT, total DECIMAL(10, 2) NOT NULL, status VARCHAR(20) );",
            "INSERT INTO orders (total, status) VALUES (10.00, 'new');",
            "CREATE DEFINER=`admin`@`%` TRIGGER orders_status BEFORE INSERT ON orders FOR EACH ROW BEGIN IF NEW.status IS NULL THEN SET NEW.status = 'new'; END IF; END;",
            "CREATE PROCEDURE order_count() BEGIN SELECT COUNT(*) FROM orders; END;",
            "SELECT * FROM orders;",
        ]
    );
}

#[test]
fn test_split_is_stable_on_its_own_output() {
    let once = split_statements(MIGRATION);
    let joined = once
        .iter()
        .map(|s| s.as_str())
        .filter(|s| !s.starts_with("CREATE DEFINER") && !s.starts_with("CREATE PROCEDURE"))
        .collect::<Vec<_>>()
        .join("\n");

    let twice = split_statements(&joined);
    assert_eq!(twice.len(), 3);
}

#[test]
fn test_split_through_trait_object() {
    let splitter: Box<dyn StatementSplitter> = Box::new(HeuristicSplitter::new());
    let statements = splitter.split("UPDATE a SET x = 1;\n\n\nDELETE FROM b WHERE id = 2");

    assert_eq!(statements.len(), 2);
    assert_eq!(statements[1].as_str(), "DELETE FROM b WHERE id = 2;");
}
